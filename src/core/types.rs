//! # Core Types Module
//!
//! Request, response and secret types shared by the guard, the forwarding engine
//! and the diagnostic endpoints.
//!
//! Secrets are wrapped in newtypes whose `Debug` output is redacted, so that a
//! stray `{:?}` on the configuration never puts a key into the logs.

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Shared secret clients must present to use the gateway.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Exact, case-sensitive comparison against a presented value
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Upstream API key injected on every forwarded call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpstreamCredential(String);

impl UpstreamCredential {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Header value for the credential, marked sensitive so hyper never logs it
    pub fn header_value(&self) -> Option<HeaderValue> {
        let mut value = HeaderValue::from_str(&self.0).ok()?;
        value.set_sensitive(true);
        Some(value)
    }
}

impl fmt::Debug for UpstreamCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpstreamCredential(***)")
    }
}

/// A request on its way to upstream.
///
/// Built from the inbound request; the forwarding engine decides what the
/// outbound request looks like.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Unique identifier used in log lines for this forward
    pub id: String,

    pub method: Method,

    /// Inbound path, e.g. `/fixtures`
    pub path: String,

    /// Raw query string exactly as received, without the leading `?`
    pub query: Option<String>,

    pub headers: HeaderMap,

    pub body: Bytes,

    /// Timestamp when the request was received
    pub received_at: Instant,
}

impl ProxyRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            query: query.filter(|q| !q.is_empty()),
            headers,
            body,
            received_at: Instant::now(),
        }
    }
}

/// What upstream answered, relayed to the caller unchanged.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: Option<HeaderValue>,
    /// Relayed so that compressed upstream bodies remain decodable by the caller
    pub content_encoding: Option<HeaderValue>,
}

impl ProxyResponse {
    /// Convert into an axum response carrying the same status, body and type
    pub fn into_axum(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(axum::body::Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        if let Some(content_encoding) = self.content_encoding {
            headers.insert(header::CONTENT_ENCODING, content_encoding);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        let key = UpstreamCredential::new("api-key-123");
        assert!(!format!("{:?}", token).contains("super-secret"));
        assert!(!format!("{:?}", key).contains("api-key-123"));
    }

    #[test]
    fn test_access_token_exact_match() {
        let token = AccessToken::new("Secret");
        assert!(token.matches("Secret"));
        assert!(!token.matches("secret"));
        assert!(!token.matches("Secret "));
        assert!(!token.matches(""));
    }

    #[test]
    fn test_empty_query_is_normalized_to_none() {
        let request = ProxyRequest::new(
            Method::GET,
            "/status",
            Some(String::new()),
            HeaderMap::new(),
            Bytes::new(),
        );
        assert!(request.query.is_none());
    }

    #[test]
    fn test_proxy_response_into_axum() {
        let response = ProxyResponse {
            status: StatusCode::IM_A_TEAPOT,
            body: Bytes::from_static(b"raw"),
            content_type: Some(HeaderValue::from_static("text/plain")),
            content_encoding: None,
        }
        .into_axum();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }
}
