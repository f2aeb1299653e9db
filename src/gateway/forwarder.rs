//! # Forwarding Engine
//!
//! The catch-all handler behind every path the gateway does not serve itself.
//! It rewrites an inbound request for the upstream host, injects the upstream
//! credential, dispatches with a bounded timeout and relays status, body and
//! content type back without looking at the payload.
//!
//! ## Failure Classification
//! - credential unset: `Misconfigured`, no network call
//! - verb other than GET/POST: `MethodNotAllowed`, no network call
//! - no answer within the bound: `UpstreamTimeout`
//! - anything else on the wire: `UpstreamError`
//!
//! The engine owns no mutable state, so repeating a forward is safe and yields
//! an identical outbound request.

use axum::http::{header, HeaderMap, HeaderName, Method};
use reqwest::Client;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::core::config::{UpstreamConfig, UPSTREAM_CREDENTIAL_HEADER};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{ProxyRequest, ProxyResponse, UpstreamCredential};

/// Forwards requests to the upstream API
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    /// Shared connection pool, also used by the diagnostic endpoints
    client: Client,

    /// Upstream base URL without trailing slash
    base_url: String,

    credential: Option<UpstreamCredential>,

    timeout: Duration,
}

impl ForwardingEngine {
    /// Create an engine with its own HTTP client built from the upstream config
    pub fn new(config: &UpstreamConfig) -> GatewayResult<Self> {
        let client = build_client(config)?;
        Ok(Self::with_client(client, config))
    }

    /// Create an engine around an existing client
    pub fn with_client(client: Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential: config.api_key.clone().filter(|key| !key.is_empty()),
            timeout: config.timeout,
        }
    }

    /// The outbound HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// Whether the catch-all route forwards this verb
    pub fn accepts(method: &Method) -> bool {
        *method == Method::GET || *method == Method::POST
    }

    /// Build the upstream URL: base + path with exactly one slash at the join,
    /// followed by the raw query string untouched
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let path = path.trim_start_matches('/');
        match query {
            Some(query) if !query.is_empty() => format!("{}/{}?{}", self.base_url, path, query),
            _ => format!("{}/{}", self.base_url, path),
        }
    }

    /// Build outbound headers from the inbound set
    ///
    /// `host` is dropped and the credential header is overwritten, so whatever
    /// the client sent under that name never reaches upstream. Framing headers
    /// are dropped because the client recomputes them for the body it sends.
    pub fn outbound_headers(&self, inbound: &HeaderMap, credential: &UpstreamCredential) -> GatewayResult<HeaderMap> {
        let mut headers = inbound.clone();
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);

        let value = credential
            .header_value()
            .ok_or(GatewayError::Misconfigured)?;
        headers.insert(HeaderName::from_static(UPSTREAM_CREDENTIAL_HEADER), value);

        Ok(headers)
    }

    /// Forward a request upstream and relay the answer
    #[instrument(
        skip_all,
        fields(request_id = %request.id, method = %request.method, path = %request.path)
    )]
    pub async fn forward(&self, request: ProxyRequest) -> GatewayResult<ProxyResponse> {
        if !Self::accepts(&request.method) {
            return Err(GatewayError::MethodNotAllowed {
                method: request.method.to_string(),
            });
        }

        let credential = match &self.credential {
            Some(credential) => credential,
            None => {
                error!("Upstream credential is not configured, refusing to forward");
                return Err(GatewayError::Misconfigured);
            }
        };

        let url = self.target_url(&request.path, request.query.as_deref());
        let headers = self.outbound_headers(&request.headers, credential)?;

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .timeout(self.timeout);

        if request.method == Method::POST {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let content_encoding = response.headers().get(header::CONTENT_ENCODING).cloned();

        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        info!(
            upstream_status = status.as_u16(),
            body_bytes = body.len(),
            elapsed_ms = request.received_at.elapsed().as_millis() as u64,
            "Forwarded request upstream"
        );

        Ok(ProxyResponse {
            status,
            body,
            content_type,
            content_encoding,
        })
    }

    /// Map a client error to the gateway taxonomy, logging timeouts and other
    /// failures under different messages
    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            warn!(
                timeout_ms = self.timeout.as_millis() as u64,
                "Upstream timed out"
            );
            GatewayError::UpstreamTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            error!(error = %err, "Upstream request failed");
            GatewayError::upstream(err.to_string())
        }
    }
}

/// Build the outbound client
///
/// IPv4 preference is a property of this client only: binding the local
/// address to `0.0.0.0` restricts its sockets to IPv4.
pub fn build_client(config: &UpstreamConfig) -> GatewayResult<Client> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    if config.force_ipv4 {
        builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        info!("Outbound HTTP client restricted to IPv4");
    }

    builder
        .build()
        .map_err(|e| GatewayError::config(format!("Failed to create HTTP client: {}", e)))
}
