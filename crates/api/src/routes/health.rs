//! Health check and metrics endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics, MetricsSnapshot};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = health().report();

    Json(HealthResponse {
        status: report.status,
        environment: state.environment().to_string(),
        transport: state.transport().to_string(),
        uptime_secs: state.uptime_secs(),
        components: report.components,
    })
}

/// GET /health/ready - Readiness probe (every tracked dependency healthy).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics - Counter, gauge and latency snapshot.
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
