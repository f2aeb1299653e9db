//! # Error Handling Module
//!
//! Every failure the gateway can produce is a variant of [`GatewayError`]. Each
//! component converts what it detects into one of these variants, and the
//! `IntoResponse` implementation turns it into an HTTP reply at the boundary, so
//! no failure ever escapes a handler as an unhandled fault.
//!
//! ## Wire Shape
//!
//! Error bodies always look like `{"detail": "<message>"}`. Clients of the
//! gateway already parse that shape, so it is kept for every variant.
//!
//! ## Variant to Status Mapping
//!
//! | Variant              | Status |
//! |----------------------|--------|
//! | `AuthRejected`       | 401    |
//! | `Misconfigured`      | 500    |
//! | `UpstreamTimeout`    | 504    |
//! | `UpstreamError`      | 500    |
//! | `MethodNotAllowed`   | 405    |
//! | `BadSeasonFormat`    | 400    |
//! | `ReferenceNotFound`  | 404    |
//! | `InvalidRequestBody` | 400    |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Message returned to callers that fail the access check.
pub const AUTH_REJECTED_MESSAGE: &str = "Token inválido ou ausente";

/// Error types for the gateway
///
/// The `#[error("...")]` text is exactly what ends up in the `detail` field of
/// the response body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing or wrong shared secret on a gated route
    #[error("{}", AUTH_REJECTED_MESSAGE)]
    AuthRejected,

    /// Upstream credential is not configured; nothing was sent upstream
    #[error("Upstream credential is not configured on the gateway")]
    Misconfigured,

    /// Upstream did not answer within the configured bound
    #[error("Upstream unavailable: no response within {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    /// Any other transport or protocol failure talking to upstream
    #[error("Proxy error: {message}")]
    UpstreamError { message: String },

    /// Verb not accepted by the catch-all route
    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String },

    /// Season parameter is not a 4-digit string
    #[error("Invalid season '{season}': expected a 4-digit year such as 2024")]
    BadSeasonFormat { season: String },

    /// No curated data for the season nor in the undated fallback
    #[error("No curated league data available for season {season}")]
    ReferenceNotFound { season: String },

    /// Inbound body could not be read (too large or interrupted)
    #[error("Invalid request body: {message}")]
    InvalidRequestBody { message: String },

    /// Configuration errors detected while loading or validating settings
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an upstream transport error with a diagnostic message
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::UpstreamError {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code returned to clients for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthRejected => StatusCode::UNAUTHORIZED,
            Self::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadSeasonFormat { .. } => StatusCode::BAD_REQUEST,
            Self::ReferenceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequestBody { .. } => StatusCode::BAD_REQUEST,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for logs
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::AuthRejected => "auth_rejected",
            Self::Misconfigured => "misconfigured",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::UpstreamError { .. } => "upstream_error",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::BadSeasonFormat { .. } => "bad_season_format",
            Self::ReferenceNotFound { .. } => "reference_not_found",
            Self::InvalidRequestBody { .. } => "invalid_request_body",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration {
            message: format!("YAML error: {}", err),
        }
    }
}

/// Converts the error into `{"detail": ...}` with the mapped status code,
/// logging the error type (warn for 5xx, debug otherwise).
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error_type = self.error_type(), status = status.as_u16(), error = %self, "Request failed");
        } else {
            debug!(error_type = self.error_type(), status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("Invalid port: {}", port)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::GatewayError::config(format!($($arg)*))
    };
}
