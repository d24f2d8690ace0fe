#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use cspm_server::app;
use cspm_server::state::AppState;
use cspm_storage::InventoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context() -> Result<TestContext> {
    cspm_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(InventoryStore::new(temp_dir.path())?);

    let state = AppState {
        store,
        start_time: Utc::now(),
    };
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.unwrap_or(Value::Null).to_string()))
        .expect("request should build");

    run(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    run(app, req).await
}

async fn run(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, body, trace_id)
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["err_code"].as_i64(), Some(0), "body: {body}");
    assert_eq!(body["err_msg"].as_str(), Some("success"), "body: {body}");
    assert!(body["trace_id"].is_string());
}

pub fn assert_err_envelope(body: &Value, err_code: i64) {
    assert_eq!(body["err_code"].as_i64(), Some(err_code), "body: {body}");
    assert!(body["trace_id"].is_string());
}

/// Minimal valid creation payload; override fields per scenario.
pub fn account_payload(dept: &str, group: &str, name: &str, account_id: &str) -> Value {
    json!({
        "department_name": dept,
        "monitor_group_name": group,
        "name": name,
        "provider": "AWS",
        "account_id": account_id,
    })
}

/// POST an account and return the created entity from the envelope.
pub async fn create_account(app: &axum::Router, payload: Value) -> Value {
    let (status, body, _) = request_json(app, "POST", "/v1/accounts", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_ok_envelope(&body);
    body["data"].clone()
}
