use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use waiter_agent::MemoryOrderSink;
use waiter_llm::provider::mock::MockProvider;
use waiter_server::api_webhook::{sign, SIGNATURE_HEADER};
use waiter_server::config::Config;
use waiter_server::{app, AppState};

const SECRET: &str = "whsec_test";

fn router() -> axum::Router {
    let mut config = Config::default();
    config.webhook.secret = Some(SECRET.to_string());
    let state = AppState::from_config(
        &config,
        Arc::new(MockProvider::default()),
        Arc::new(MemoryOrderSink::new()),
    )
    .unwrap();
    app(state)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn post(body: &str, signature: Option<String>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        request = request.header(SIGNATURE_HEADER, signature);
    }
    let response = router()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn signed_lifecycle_events_are_acknowledged() {
    for event in ["call_started", "call_ended", "call_analyzed", "something_new"] {
        let body = json!({"event": event, "data": {"call_id": "call_1"}}).to_string();
        let signature = sign(SECRET, body.as_bytes(), now_ms()).unwrap();

        let (status, reply) = post(&body, Some(signature)).await;
        assert_eq!(status, StatusCode::OK, "{event}");
        assert_eq!(reply, json!({"received": true}));
    }
}

#[tokio::test]
async fn wrong_signature_is_unauthorized() {
    let body = json!({"event": "call_started", "data": {"call_id": "call_1"}}).to_string();
    let signature = sign("not-the-secret", body.as_bytes(), now_ms()).unwrap();

    let (status, reply) = post(&body, Some(signature)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply, json!({"message": "Unauthorized"}));
}

#[tokio::test]
async fn missing_signature_is_unauthorized() {
    let body = json!({"event": "call_started", "data": {}}).to_string();
    let (status, _) = post(&body, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_signature_is_unauthorized() {
    let body = json!({"event": "call_ended", "data": {"call_id": "call_1"}}).to_string();
    let an_hour_ago = now_ms() - 3_600_000;
    let signature = sign(SECRET, body.as_bytes(), an_hour_ago).unwrap();

    let (status, _) = post(&body, Some(signature)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let not_json = "{event: call_started";
    let signature = sign(SECRET, not_json.as_bytes(), now_ms()).unwrap();
    let (status, reply) = post(not_json, Some(signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply, json!({"message": "Invalid JSON format"}));

    for body in [json!({"event": "call_started"}), json!(["call_started"])] {
        let body = body.to_string();
        let signature = sign(SECRET, body.as_bytes(), now_ms()).unwrap();
        let (status, reply) = post(&body, Some(signature)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            reply,
            json!({"message": "Missing required fields: event and data"})
        );
    }
}
