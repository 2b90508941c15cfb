use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use nmos_port_explorer::probe::{HttpProber, ProberConfig};
use nmos_port_explorer::server::{router, AppState, ResultsBody, RunPhase, Status};
use nmos_port_explorer::types::Probability;

fn app() -> Router {
    router(AppState::new(HttpProber::new(ProberConfig::default()).unwrap()))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn wait_until_finished(app: &Router) -> Status {
    for _ in 0..100 {
        let (_, body) = call(app, "GET", "/api/status", None).await;
        let status: Status = serde_json::from_value(body).unwrap();
        if status.state != RunPhase::Running {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("scan did not finish in time");
}

#[tokio::test]
async fn idle_status() {
    let (code, body) = call(&app(), "GET", "/api/status", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn classify_endpoint() {
    let app = app();
    let (_, body) = call(&app, "GET", "/api/classify?target=192.168.1.5", None).await;
    assert_eq!(body["is_local"], true);
    let (_, body) = call(&app, "GET", "/api/classify?target=8.8.8.8", None).await;
    assert_eq!(body["is_local"], false);
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let app = app();
    let (code, body) = call(
        &app,
        "POST",
        "/api/scan",
        Some(json!({
            "target": "10.0.0.1",
            "port_mode": "range",
            "port_range_start": "1",
            "port_range_end": "20000"
        })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("10000"));

    let (code, _) = call(&app, "POST", "/api/scan", Some(json!({"target": "  "}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_target_needs_consent() {
    let (code, _) = call(
        &app(),
        "POST",
        "/api/scan",
        Some(json!({"target": "8.8.8.8", "port_list": "80"})),
    )
    .await;
    assert_eq!(code, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stop_without_scan_conflicts() {
    let (code, _) = call(&app(), "POST", "/api/stop", None).await;
    assert_eq!(code, StatusCode::CONFLICT);
}

#[tokio::test]
async fn scan_lifecycle_against_mock_node() {
    let node = Router::new()
        .route("/x-nmos/node/", get(|| async { Json(json!(["v1.3/"])) }))
        .route("/x-nmos/connection/", get(|| async { Json(json!(["v1.1/"])) }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, node).await.unwrap();
    });

    let app = app();
    let (code, body) = call(
        &app,
        "POST",
        "/api/scan",
        Some(json!({"target": "127.0.0.1", "port_list": port.to_string(), "timeout_ms": 1000})),
    )
    .await;
    assert_eq!(code, StatusCode::ACCEPTED);
    assert_eq!(body["state"], "running");
    assert_eq!(body["total"], 4);

    let status = wait_until_finished(&app).await;
    assert_eq!(status.state, RunPhase::Completed);
    assert_eq!(status.completed, 4);
    assert_eq!(status.percent, 100);
    assert_eq!(status.found, 2);

    let (_, body) = call(&app, "GET", "/api/results", None).await;
    let results: ResultsBody = serde_json::from_value(body).unwrap();
    assert_eq!(results.groups.len(), 1);
    assert_eq!(results.groups[0].port, port);
    assert_eq!(results.groups[0].probability, Probability::High);

    let (code, body) = call(&app, "DELETE", "/api/results", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    let (_, body) = call(&app, "GET", "/api/results", None).await;
    assert_eq!(body["groups"], json!([]));
}
