#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use healthcore_server::app;
use healthcore_server::config::{AppConfig, StoreBackend};
use healthcore_server::db::mirror::ReportMirror;
use healthcore_server::db::Store;
use healthcore_server::risk::RiskModel;
use healthcore_server::state::AppState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

/// A distinct client address per context so the signup limiter's global
/// table never couples tests.
fn next_client_addr() -> SocketAddr {
    static NEXT: AtomicU16 = AtomicU16::new(1);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    SocketAddr::from(([10, 0, (n >> 8) as u8, (n & 0xff) as u8], 40000))
}

/// Decision tree on the case count: <= 5 is Low Risk, <= 10 Medium Risk,
/// above that High Risk (80%).
pub fn case_tree_model_json() -> Value {
    json!({
        "model": {
            "kind": "decision_tree",
            "nodes": [
                { "feature": 1, "threshold": 5.0, "left": 1, "right": 2 },
                { "value": [0.0, 0.0, 10.0, 0.0] },
                { "feature": 1, "threshold": 10.0, "left": 3, "right": 4 },
                { "value": [1.0, 9.0, 0.0, 0.0] },
                { "value": [8.0, 2.0, 0.0, 0.0] }
            ]
        },
        "scaler": { "mean": [0, 0, 0, 0, 0, 0, 0], "scale": [1, 1, 1, 1, 1, 1, 1] },
        "feature_names": ["pH", "Total_Cases", "TDS", "F", "NO3", "Cl", "EC in μS/cm"],
        "classes": ["High Risk", "Medium Risk", "Low Risk", "No Risk"],
        "accuracy": 0.91
    })
}

pub fn build_test_context() -> Result<TestContext> {
    build_context(false)
}

pub fn build_test_context_with_model() -> Result<TestContext> {
    build_context(true)
}

fn build_context(with_model: bool) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;

    let model_path = temp_dir.path().join("model.json");
    if with_model {
        std::fs::write(&model_path, serde_json::to_vec(&case_tree_model_json())?)?;
    }

    let config = AppConfig {
        store_backend: StoreBackend::Sqlite,
        sqlite_db_path: temp_dir.path().join("healthcore.db"),
        mongo_uri: None,
        mongo_db_name: "healthcore_test".to_string(),
        connect_retries: 1,
        retry_backoff: Duration::from_millis(1),
        model_path,
        reports_csv_path: temp_dir.path().join("database/reports.csv"),
        jwt_secret: "test-secret".to_string(),
        password_hash_cost: 4,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
    };

    let store = Store::open_sqlite(&config.sqlite_db_path)?;
    let model = RiskModel::load(&config.model_path);
    let mirror = ReportMirror::new(config.reports_csv_path.clone());
    let state = AppState::new(store, model, mirror, config);

    let app = app::build_http_app(state.clone()).layer(MockConnectInfo(next_client_addr()));

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_form(app: &axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    authorization: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    let req = builder.body(Body::empty()).expect("request should build");
    send(app, req).await
}

pub async fn submit_report(app: &axum::Router, body: Value) -> Value {
    let (status, resp) = request_json(app, "POST", "/api/report", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {resp}");
    resp
}

pub async fn request_raw(
    app: &axum::Router,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }
    let req = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, req).await
}
