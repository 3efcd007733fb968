//! Response bodies.

use serde::{Deserialize, Serialize};
use telemetry::{ComponentHealthReport, HealthStatus};

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub environment: String,
    pub transport: String,
    pub uptime_secs: i64,
    pub components: Vec<ComponentHealthReport>,
}
