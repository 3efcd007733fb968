//! Downtime and energy aggregation collaborators.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Skew applied when none is configured.
pub const DEFAULT_SKEW_MINUTES: i64 = 5;

/// Thresholds for a machine downtime pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DowntimeParams {
    /// Shortest gap between pulses that counts as downtime.
    pub min_duration_minutes: i64,
    pub energy_alert_kwh: i64,
    pub energy_alert_minutes: i64,
    pub machine_down_alert_minutes: i64,
    /// Gaps closing inside this window are left open for late telemetry.
    pub skew_minutes: i64,
}

impl DowntimeParams {
    /// Replaces a zero skew with [`DEFAULT_SKEW_MINUTES`].
    pub fn with_default_skew(mut self) -> Self {
        if self.skew_minutes == 0 {
            self.skew_minutes = DEFAULT_SKEW_MINUTES;
        }
        self
    }
}

/// Derives machine downtime from stored pulses.
#[async_trait]
pub trait DowntimeService: Send + Sync {
    async fn upload_downtime(&self, params: &DowntimeParams) -> Result<()>;
}

/// Derives per-minute energy of line devices.
#[async_trait]
pub trait EnergyService: Send + Sync {
    async fn calculate_line_downtime_energy(&self) -> Result<()>;
}

/// Derives line-level downtime from line pulses and line energy.
#[async_trait]
pub trait LineDowntimeService: Send + Sync {
    async fn upload_line_downtime(&self) -> Result<()>;
}
