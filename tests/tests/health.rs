//! Tests for the health and metrics endpoints.
//!
//! The health registry is process-wide, so readiness transitions are checked
//! in a single test.

use api::{router, AppState};
use axum::http::StatusCode;
use axum_test::TestServer;
use telemetry::health;

fn server(transport: &str) -> TestServer {
    TestServer::new(router(AppState::new("test", transport))).expect("Failed to create test server")
}

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let server = server("stream");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["environment"], "test");
    assert_eq!(body["transport"], "stream");
    assert!(body["uptime_secs"].as_i64().is_some());
    assert!(body["components"].is_array());

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "unexpected status '{}'",
        status
    );
}

/// Readiness follows the tracked components
#[tokio::test]
async fn test_readiness_tracks_components() {
    let server = server("mqtt");

    health().clickhouse.track();
    health().clickhouse.set_unhealthy("connection refused");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = server.get("/health").await.json();
    let clickhouse = body["components"]
        .as_array()
        .and_then(|c| c.iter().find(|c| c["name"] == "clickhouse"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(clickhouse["healthy"], false);
    assert_eq!(clickhouse["message"], "connection refused");

    health().clickhouse.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
}

/// Test /health/live always returns 200
#[tokio::test]
async fn test_liveness_probe() {
    server("stream").get("/health/live").await.assert_status_ok();
}

/// Test /metrics returns a counter snapshot
#[tokio::test]
async fn test_metrics_snapshot() {
    let response = server("stream").get("/metrics").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in [
        "events_received",
        "decode_errors",
        "records_flushed",
        "checkpoints_saved",
        "scheduler_cycles",
        "active_partitions",
        "broker_connected",
    ] {
        assert!(body.get(field).is_some(), "missing metric '{}'", field);
    }
}
