//! HTTP Surface Tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`:
//! - Health and server time
//! - Token issuance and the uniform refusal body
//! - The token guard on protected routes

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use devicetrust_gate::{create_router, AppState, Gatekeeper, ManualClock, MemoryStore, TokenIssuer};

// =============================================================================
// Test Helpers
// =============================================================================

const NOW: i64 = 1_725_000_000;

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let gate = Gatekeeper::builder(TokenIssuer::new(b"http-suite-secret-0123456789abcdef", 300))
        .memory_store(store.clone())
        .clock(Arc::new(ManualClock::new(NOW)))
        .build();

    (create_router(Arc::new(AppState::new(gate))), store)
}

fn token_request(fingerprint: &str, timestamp: i64) -> Value {
    json!({
        "deviceId": "device-42",
        "fingerprint": fingerprint,
        "timestamp": timestamp,
        "components": {
            "userAgent": "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) Mobile/15E148",
            "platform": "iPhone",
            "screenResolution": "390x844",
            "timezone": "Asia/Tokyo",
            "language": "ja-JP",
            "cpuCores": 6,
            "touchSupport": true,
            "canvas": "canvas-digest-1",
            "audio": "124.04347527516074"
        }
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("user-agent", "integration-test")
        .header("x-forwarded-for", "198.51.100.23, 10.0.0.1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn obtain_token(app: &Router, fingerprint: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/api/app-token", &token_request(fingerprint, NOW)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

// =============================================================================
// Public Endpoints
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (app, _) = app();

    let response = app.oneshot(get("/health", &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_server_time_uses_gate_clock() {
    let (app, _) = app();

    let response = app.oneshot(get("/api/time", &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["timestamp"], NOW);
    assert!(body["serverTime"].as_str().unwrap().starts_with("2024-08-30"));
}

// =============================================================================
// Token Issuance
// =============================================================================

#[tokio::test]
async fn test_issue_token() {
    let (app, store) = app();

    let response = app
        .oneshot(post_json("/api/app-token", &token_request("fp-http", NOW)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["fingerprint"], "fp-http");
    assert_eq!(body["expiresAt"], NOW + 300);
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
    assert!(body.get("issuedAt").is_none());

    let outcome = store.outcomes().pop().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.ip_address, "198.51.100.23");
    assert_eq!(outcome.user_agent, "integration-test");
}

#[tokio::test]
async fn test_refusal_is_uniform() {
    let (app, _) = app();

    let stale = app
        .clone()
        .oneshot(post_json("/api/app-token", &token_request("fp-stale", NOW - 600)))
        .await
        .unwrap();
    let missing = app
        .clone()
        .oneshot(post_json("/api/app-token", &json!({ "fingerprint": "fp" })))
        .await
        .unwrap();

    for response in [stale, missing] {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid request");
    }
}

#[tokio::test]
async fn test_unreadable_body_is_refused() {
    let (app, _) = app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/app-token")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid request");
}

// =============================================================================
// Token Guard
// =============================================================================

#[tokio::test]
async fn test_session_with_valid_token() {
    let (app, _) = app();
    let token = obtain_token(&app, "fp-session").await;

    let response = app
        .oneshot(get(
            "/api/session",
            &[("x-fingerprint", "fp-session"), ("x-app-token", token.as_str())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["fingerprint"], "fp-session");
}

#[tokio::test]
async fn test_session_without_headers() {
    let (app, _) = app();

    let response = app
        .oneshot(get("/api/session", &[("x-fingerprint", "fp-session")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Missing authentication");
}

#[tokio::test]
async fn test_session_with_swapped_fingerprint() {
    let (app, store) = app();
    let token = obtain_token(&app, "fp-owner").await;

    let response = app
        .oneshot(get(
            "/api/session",
            &[("x-fingerprint", "fp-thief"), ("x-app-token", token.as_str())],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid token");
    assert!(!store.outcomes().pop().unwrap().success);
}
