//! Downtime and energy scheduler.
//!
//! Wakes shortly after the first wall-clock minute boundary, then runs one
//! aggregation cycle every 60 seconds until cancelled. A failed cycle is
//! logged and reported; the loop keeps going.

use crate::notifications::{ErrorContext, Notifier};
use chrono::{DateTime, Timelike, Utc};
use engine_core::{
    DowntimeParams, DowntimeService, EnergyService, LineDowntimeService, Result,
    DEFAULT_SKEW_MINUTES,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use validator::Validate;

/// Pause between the end of one cycle and the start of the next.
pub const CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// Seconds before a minute boundary that still count as "at" the boundary.
const BOUNDARY_SLACK_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SchedulerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_downtime_minutes")]
    #[validate(range(min = 0, max = 1440))]
    pub min_downtime_minutes: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub energy_alert_kwh: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 1440))]
    pub energy_alert_minutes: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 1440))]
    pub machine_down_alert_minutes: i64,
    /// Zero means the default of 5 minutes
    #[serde(default)]
    #[validate(range(min = 0, max = 1440))]
    pub skew_minutes: i64,
    /// Also derive line energy and line downtime
    #[serde(default)]
    pub line_check: bool,
    #[serde(default = "default_min_downtime_minutes")]
    #[validate(range(min = 0, max = 1440))]
    pub line_min_downtime_minutes: i64,
    /// Window of pulse history scanned per cycle
    #[serde(default = "default_lookback_hours")]
    #[validate(range(min = 1, max = 720))]
    pub lookback_hours: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_min_downtime_minutes() -> i64 {
    5
}

fn default_lookback_hours() -> u32 {
    24
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_downtime_minutes: default_min_downtime_minutes(),
            energy_alert_kwh: 0,
            energy_alert_minutes: 0,
            machine_down_alert_minutes: 0,
            skew_minutes: 0,
            line_check: false,
            line_min_downtime_minutes: default_min_downtime_minutes(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

impl SchedulerConfig {
    pub fn downtime_params(&self) -> DowntimeParams {
        DowntimeParams {
            min_duration_minutes: self.min_downtime_minutes,
            energy_alert_kwh: self.energy_alert_kwh,
            energy_alert_minutes: self.energy_alert_minutes,
            machine_down_alert_minutes: self.machine_down_alert_minutes,
            skew_minutes: self.skew_minutes,
        }
        .with_default_skew()
    }

    pub fn effective_skew_minutes(&self) -> i64 {
        if self.skew_minutes == 0 {
            DEFAULT_SKEW_MINUTES
        } else {
            self.skew_minutes
        }
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Seconds from `now` until the next full minute (1..=60).
pub fn seconds_to_next_minute(now: DateTime<Utc>) -> u64 {
    60 - u64::from(now.second())
}

/// Delay before the first cycle given the seconds left in the current minute.
pub fn initial_delay(remaining_secs: u64) -> Duration {
    if remaining_secs <= BOUNDARY_SLACK_SECS {
        Duration::ZERO
    } else {
        Duration::from_secs(remaining_secs - BOUNDARY_SLACK_SECS)
    }
}

/// Aggregation collaborators invoked each cycle.
#[derive(Clone)]
pub struct AggregationJobs {
    pub downtime: Arc<dyn DowntimeService>,
    pub energy: Arc<dyn EnergyService>,
    pub line_downtime: Arc<dyn LineDowntimeService>,
}

pub struct DowntimeScheduler {
    config: SchedulerConfig,
    jobs: AggregationJobs,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl DowntimeScheduler {
    pub fn new(config: SchedulerConfig, jobs: AggregationJobs, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            jobs,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let delay = initial_delay(seconds_to_next_minute(self.clock.now()));
        info!(
            delay_secs = delay.as_secs(),
            line_check = self.config.line_check,
            "Downtime scheduler started"
        );

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        loop {
            self.tick().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(CYCLE_INTERVAL) => {}
            }
        }

        info!("Downtime scheduler stopped");
    }

    /// Runs one cycle, reporting failure instead of returning it.
    pub async fn tick(&self) {
        let started_at = self.clock.now();
        let start = Instant::now();
        let result = self.run_cycle().await;
        let elapsed = start.elapsed();

        metrics().scheduler_cycles.inc();
        metrics().scheduler_cycle_ms.observe(elapsed.as_millis() as u64);

        match result {
            Ok(()) => info!(
                started_at = %started_at,
                latency_ms = %elapsed.as_millis(),
                "Scheduler cycle completed"
            ),
            Err(e) => {
                metrics().scheduler_failures.inc();
                error!(
                    started_at = %started_at,
                    latency_ms = %elapsed.as_millis(),
                    error_code = ?e.error_code(),
                    "Scheduler cycle failed: {}",
                    e
                );
                self.notifier.report(ErrorContext::new("scheduler", &e)).await;
            }
        }
    }

    /// Machine downtime, then line energy and line downtime when enabled.
    pub async fn run_cycle(&self) -> Result<()> {
        self.jobs
            .downtime
            .upload_downtime(&self.config.downtime_params())
            .await?;

        if self.config.line_check {
            debug!("Running line checks");
            self.jobs.energy.calculate_line_downtime_energy().await?;
            self.jobs.line_downtime.upload_line_downtime().await?;
        }
        Ok(())
    }
}
