//! # Access Guard Tests
//!
//! Unit tests for the decision function plus middleware tests that run the guard
//! in front of a handler counting how often it is reached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    routing::any,
    Router,
};
use tower::ServiceExt;

use crate::auth::middleware::{access_guard_middleware, AccessGuard, AuthDecision};
use crate::core::config::AccessConfig;
use crate::core::types::AccessToken;

const TOKEN: &str = "CF_Proxy_Test_Secret";

fn guard_with_token(token: Option<&str>) -> AccessGuard {
    let config = AccessConfig {
        token: token.map(AccessToken::new),
        ..AccessConfig::default()
    };
    AccessGuard::new(&config).unwrap()
}

fn headers_with(name: &'static str, value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(name, HeaderValue::from_static(value));
    headers
}

/// Router whose only handler counts invocations
fn counting_app(guard: AccessGuard) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new()
        .route(
            "/*path",
            any(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "forwarded"
                }
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(guard),
            access_guard_middleware,
        ));

    (app, hits)
}

#[test]
fn test_valid_token_is_allowed() {
    let guard = guard_with_token(Some(TOKEN));
    let headers = headers_with("x-proxy-token", TOKEN);
    assert_eq!(guard.authorize("/fixtures", &headers), AuthDecision::Allow);
}

#[test]
fn test_header_name_is_case_insensitive() {
    let guard = guard_with_token(Some(TOKEN));
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::HeaderName::from_bytes(b"X-Proxy-Token").unwrap(),
        HeaderValue::from_static(TOKEN),
    );
    assert_eq!(guard.authorize("/fixtures", &headers), AuthDecision::Allow);
}

#[test]
fn test_missing_or_wrong_token_is_rejected() {
    let guard = guard_with_token(Some(TOKEN));
    assert_eq!(guard.authorize("/fixtures", &HeaderMap::new()), AuthDecision::Reject);
    assert_eq!(
        guard.authorize("/fixtures", &headers_with("x-proxy-token", "wrong")),
        AuthDecision::Reject
    );
    assert_eq!(
        guard.authorize("/fixtures", &headers_with("authorization", TOKEN)),
        AuthDecision::Reject
    );
}

#[test]
fn test_token_value_comparison_is_exact() {
    let guard = guard_with_token(Some(TOKEN));
    assert_eq!(
        guard.authorize("/status", &headers_with("x-proxy-token", "cf_proxy_test_secret")),
        AuthDecision::Reject
    );
}

#[test]
fn test_public_path_ignores_headers() {
    let guard = guard_with_token(Some(TOKEN));
    assert_eq!(guard.authorize("/ip", &HeaderMap::new()), AuthDecision::Allow);
    assert_eq!(
        guard.authorize("/ip", &headers_with("x-proxy-token", "garbage")),
        AuthDecision::Allow
    );
    // Only the exact path is public
    assert_eq!(guard.authorize("/ip/extra", &HeaderMap::new()), AuthDecision::Reject);
    assert_eq!(guard.authorize("/myip", &HeaderMap::new()), AuthDecision::Reject);
}

#[test]
fn test_unconfigured_token_rejects_everything_but_public_path() {
    let guard = guard_with_token(None);
    assert!(!guard.has_token());
    assert_eq!(
        guard.authorize("/fixtures", &headers_with("x-proxy-token", "")),
        AuthDecision::Reject
    );
    assert_eq!(guard.authorize("/ip", &HeaderMap::new()), AuthDecision::Allow);
}

#[test]
fn test_invalid_header_name_is_a_config_error() {
    let config = AccessConfig {
        header_name: "bad header".to_string(),
        ..AccessConfig::default()
    };
    assert!(AccessGuard::new(&config).is_err());
}

#[tokio::test]
async fn test_middleware_short_circuits_rejected_requests() {
    let (app, hits) = counting_app(guard_with_token(Some(TOKEN)));

    let response = app
        .oneshot(Request::builder().uri("/fixtures?league=39").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, serde_json::json!({ "detail": "Token inválido ou ausente" }));
}

#[tokio::test]
async fn test_middleware_passes_authorized_requests() {
    let (app, hits) = counting_app(guard_with_token(Some(TOKEN)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/fixtures")
                .header("x-proxy-token", TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_middleware_never_rejects_public_path() {
    let (app, hits) = counting_app(guard_with_token(Some(TOKEN)));

    for token in [None, Some("wrong"), Some(TOKEN)] {
        let mut builder = Request::builder().uri("/ip");
        if let Some(token) = token {
            builder = builder.header("x-proxy-token", token);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
