//! # Diagnostic Endpoints
//!
//! IP discovery and the upstream authorization self-test. Both reuse the
//! forwarding engine's HTTP client.
//!
//! IP discovery is polled by uptime monitors, so it never surfaces a downstream
//! failure as an HTTP error: every outcome is a 200 with a descriptive payload.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::DiagnosticsConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ProxyRequest;
use crate::gateway::forwarder::ForwardingEngine;

const IP_HINT: &str =
    "Outbound address of this gateway; add it to the upstream dashboard allow-list if IP restrictions are enabled";

/// Upstream path used for the authorization check
pub const STATUS_CHECK_PATH: &str = "/status";

/// Result of the IP discovery call
#[derive(Debug, Clone, Serialize)]
pub struct IpDiscovery {
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub hint: String,
    pub timestamp: DateTime<Utc>,
}

/// Verdict of the authorization self-test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthCheckResult {
    Authorized,
    Blocked,
    Error,
}

/// Result of the authorization self-test
#[derive(Debug, Clone, Serialize)]
pub struct AuthCheck {
    pub result: AuthCheckResult,
    pub upstream_status: Option<u16>,
    pub errors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuthCheck {
    fn error(upstream_status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            result: AuthCheckResult::Error,
            upstream_status,
            errors: None,
            detail: Some(detail.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Diagnostic operations
pub struct Diagnostics {
    engine: Arc<ForwardingEngine>,
    ip_echo_url: String,
    ip_echo_timeout: Duration,
}

impl Diagnostics {
    pub fn new(engine: Arc<ForwardingEngine>, config: &DiagnosticsConfig) -> Self {
        Self {
            engine,
            ip_echo_url: config.ip_echo_url.clone(),
            ip_echo_timeout: config.ip_echo_timeout,
        }
    }

    /// Ask the public IP-echo service which address this gateway egresses from
    pub async fn discover_ip(&self) -> IpDiscovery {
        let outcome = self.fetch_ip().await;

        match outcome {
            Ok(ip) => {
                info!(ip = %ip, "Discovered outbound IP");
                IpDiscovery {
                    ip: Some(ip),
                    error: None,
                    hint: IP_HINT.to_string(),
                    timestamp: Utc::now(),
                }
            }
            Err(message) => {
                warn!(error = %message, "IP discovery failed");
                IpDiscovery {
                    ip: None,
                    error: Some(message),
                    hint: IP_HINT.to_string(),
                    timestamp: Utc::now(),
                }
            }
        }
    }

    async fn fetch_ip(&self) -> Result<String, String> {
        let response = self
            .engine
            .client()
            .get(&self.ip_echo_url)
            .timeout(self.ip_echo_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("IP echo service timed out after {}ms", self.ip_echo_timeout.as_millis())
                } else {
                    format!("IP echo service unreachable: {}", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("IP echo service answered {}", status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read IP echo response: {}", e))?;

        parse_ip_echo(&body).ok_or_else(|| "IP echo service returned no recognizable address".to_string())
    }

    /// Query upstream `/status` with the configured credential
    ///
    /// A missing credential is reported as `Misconfigured`; every other failure
    /// becomes an `error` verdict.
    pub async fn check_authorization(&self) -> GatewayResult<AuthCheck> {
        let check = ProxyRequest::new(
            Method::GET,
            STATUS_CHECK_PATH,
            None,
            HeaderMap::new(),
            Bytes::new(),
        );

        let response = match self.engine.forward(check).await {
            Ok(response) => response,
            Err(GatewayError::Misconfigured) => return Err(GatewayError::Misconfigured),
            Err(e) => return Ok(AuthCheck::error(None, e.to_string())),
        };

        let status = response.status.as_u16();
        let decoded: Value = match serde_json::from_slice(&response.body) {
            Ok(value) => value,
            Err(e) => {
                return Ok(AuthCheck::error(
                    Some(status),
                    format!("Upstream reply is not JSON: {}", e),
                ))
            }
        };

        let errors = decoded.get("errors").cloned();
        let result = if errors.as_ref().is_some_and(has_errors) {
            AuthCheckResult::Blocked
        } else {
            AuthCheckResult::Authorized
        };

        info!(result = ?result, upstream_status = status, "Authorization self-test finished");

        Ok(AuthCheck {
            result,
            upstream_status: Some(status),
            errors,
            detail: None,
            timestamp: Utc::now(),
        })
    }
}

/// Whether an `errors` field carries anything
///
/// The upstream always includes `errors`, as `[]` when the call succeeded.
fn has_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Number(_) => true,
    }
}

/// Accept `{"ip": "..."}` or a bare address in plain text
fn parse_ip_echo(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(ip) = value.get("ip").and_then(Value::as_str) {
            return Some(ip.trim().to_string());
        }
    }

    let text = std::str::from_utf8(body).ok()?.trim();
    text.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}
