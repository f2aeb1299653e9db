//! # Access Guard Middleware
//!
//! Gates the gateway behind a single shared secret. The guard runs before any
//! routing decision that could reach upstream, so a rejected request never
//! causes network I/O.
//!
//! ## Rules
//! - The public path (IP discovery) is always allowed, whatever the headers say.
//! - Every other path is allowed only when the secret header equals the
//!   configured token exactly. A missing, different or non-UTF-8 value is
//!   rejected with 401 `{"detail": "Token inválido ou ausente"}`.
//! - With no token configured, every gated request is rejected.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::core::config::AccessConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::AccessToken;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Reject,
}

/// Stateless shared-secret guard
#[derive(Debug, Clone)]
pub struct AccessGuard {
    token: Option<AccessToken>,
    header_name: HeaderName,
    public_path: String,
}

impl AccessGuard {
    /// Create a guard from the access configuration
    pub fn new(config: &AccessConfig) -> GatewayResult<Self> {
        // HeaderName::from_bytes lowercases, which makes lookups case-insensitive
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes()).map_err(|e| {
            GatewayError::config(format!(
                "Invalid access header name '{}': {}",
                config.header_name, e
            ))
        })?;

        Ok(Self {
            token: config.token.clone(),
            header_name,
            public_path: config.public_path.clone(),
        })
    }

    /// Whether a token has been configured at all
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Check if path is exempt from the secret
    pub fn is_public_path(&self, path: &str) -> bool {
        path == self.public_path
    }

    /// Extract the presented secret from request headers
    fn extract_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(&self.header_name)
            .and_then(|value| value.to_str().ok())
    }

    /// Judge a request by its path and headers
    pub fn authorize(&self, path: &str, headers: &HeaderMap) -> AuthDecision {
        if self.is_public_path(path) {
            return AuthDecision::Allow;
        }

        match (&self.token, self.extract_token(headers)) {
            (Some(expected), Some(presented)) if expected.matches(presented) => AuthDecision::Allow,
            _ => AuthDecision::Reject,
        }
    }
}

/// Axum middleware function enforcing the access guard
pub async fn access_guard_middleware(
    State(guard): State<Arc<AccessGuard>>,
    request: Request,
    next: Next,
) -> Response {
    match guard.authorize(request.uri().path(), request.headers()) {
        AuthDecision::Allow => next.run(request).await,
        AuthDecision::Reject => {
            debug!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rejected request without a valid access token"
            );
            GatewayError::AuthRejected.into_response()
        }
    }
}
