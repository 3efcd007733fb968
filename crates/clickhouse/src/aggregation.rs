//! Downtime and energy aggregation over stored telemetry.
//!
//! Every pass recomputes a lookback window with `INSERT ... SELECT`. Target
//! tables are `ReplacingMergeTree(computed_at)`, so overlapping passes
//! replace earlier rows instead of duplicating them.

use crate::client::ClickHouseClient;
use async_trait::async_trait;
use engine_core::{
    DowntimeParams, DowntimeService, EnergyService, Error, LineDowntimeService, Result,
    DEFAULT_SKEW_MINUTES,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Settings for passes whose thresholds are not supplied per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSettings {
    /// How far back each pass recomputes.
    pub lookback_hours: u32,
    /// Shortest gap between line pulses that counts as line downtime.
    pub line_min_downtime_minutes: i64,
    /// Trailing window left open for late telemetry.
    pub skew_minutes: i64,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            line_min_downtime_minutes: 5,
            skew_minutes: DEFAULT_SKEW_MINUTES,
        }
    }
}

/// Gaps between consecutive pulses of one device, with the energy drawn
/// inside each gap and both alert flags.
///
/// Binds: lookback hours, min duration, skew minutes, energy alert kWh,
/// energy alert minutes, machine down alert minutes.
pub const MACHINE_DOWNTIME_SQL: &str = r#"
INSERT INTO machine_downtimes
    (device_id, started_at, ended_at, duration_minutes, energy_kwh, energy_alert, machine_down_alert)
WITH gaps AS (
    SELECT
        device_id,
        prev_created AS started_at,
        message_created AS ended_at,
        dateDiff('second', prev_created, message_created) / 60.0 AS duration_minutes
    FROM (
        SELECT
            device_id,
            message_created,
            lagInFrame(message_created) OVER (
                PARTITION BY device_id ORDER BY message_created
                ROWS BETWEEN 1 PRECEDING AND CURRENT ROW
            ) AS prev_created
        FROM pulse_telemetry
        WHERE message_created >= now64(3) - INTERVAL ? HOUR
    )
    WHERE toUnixTimestamp64Milli(prev_created) > 0
      AND duration_minutes >= ?
      AND ended_at <= now64(3) - INTERVAL ? MINUTE
)
SELECT
    device_id,
    started_at,
    ended_at,
    duration_minutes,
    energy_kwh,
    energy_kwh >= ? AND duration_minutes >= ? AS energy_alert,
    duration_minutes >= ? AS machine_down_alert
FROM (
    SELECT
        g.device_id AS device_id,
        g.started_at AS started_at,
        g.ended_at AS ended_at,
        g.duration_minutes AS duration_minutes,
        maxIf(toFloat64OrZero(ifNull(e.total_active_energy, '')),
              e.message_created >= g.started_at AND e.message_created <= g.ended_at)
          - minIf(toFloat64OrZero(ifNull(e.total_active_energy, '')),
              e.message_created >= g.started_at AND e.message_created <= g.ended_at) AS energy_kwh
    FROM gaps AS g
    LEFT JOIN energy_telemetry AS e ON e.device_id = g.device_id
    GROUP BY device_id, started_at, ended_at, duration_minutes
)
"#;

/// Per-minute energy of devices that report line pulses.
///
/// Binds: lookback hours, skew minutes, lookback hours.
pub const LINE_ENERGY_SQL: &str = r#"
INSERT INTO line_energy (device_id, minute, energy_kwh)
SELECT
    device_id,
    toStartOfMinute(message_created) AS minute,
    max(toFloat64OrZero(ifNull(total_active_energy, '')))
      - min(toFloat64OrZero(ifNull(total_active_energy, ''))) AS energy_kwh
FROM energy_telemetry
WHERE message_created >= now64(3) - INTERVAL ? HOUR
  AND message_created < toStartOfMinute(now64(3) - INTERVAL ? MINUTE)
  AND device_id IN (
      SELECT DISTINCT device_id FROM line_pulse_telemetry
      WHERE message_created >= now64(3) - INTERVAL ? HOUR
  )
GROUP BY device_id, minute
"#;

/// Gaps between line pulses with the line energy drawn inside them.
///
/// Binds: lookback hours, min duration, skew minutes.
pub const LINE_DOWNTIME_SQL: &str = r#"
INSERT INTO line_downtimes (device_id, started_at, ended_at, duration_minutes, energy_kwh)
WITH gaps AS (
    SELECT
        device_id,
        prev_created AS started_at,
        message_created AS ended_at,
        dateDiff('second', prev_created, message_created) / 60.0 AS duration_minutes
    FROM (
        SELECT
            device_id,
            message_created,
            lagInFrame(message_created) OVER (
                PARTITION BY device_id ORDER BY message_created
                ROWS BETWEEN 1 PRECEDING AND CURRENT ROW
            ) AS prev_created
        FROM line_pulse_telemetry
        WHERE message_created >= now64(3) - INTERVAL ? HOUR
    )
    WHERE toUnixTimestamp64Milli(prev_created) > 0
      AND duration_minutes >= ?
      AND ended_at <= now64(3) - INTERVAL ? MINUTE
)
SELECT
    g.device_id AS device_id,
    g.started_at AS started_at,
    g.ended_at AS ended_at,
    g.duration_minutes AS duration_minutes,
    sumIf(le.energy_kwh, le.minute >= toStartOfMinute(g.started_at) AND le.minute < g.ended_at) AS energy_kwh
FROM gaps AS g
LEFT JOIN line_energy AS le ON le.device_id = g.device_id
GROUP BY device_id, started_at, ended_at, duration_minutes
"#;

/// Aggregation passes backed by ClickHouse.
#[derive(Clone)]
pub struct ClickHouseAggregations {
    client: ClickHouseClient,
    settings: AggregationSettings,
}

impl ClickHouseAggregations {
    pub fn new(client: ClickHouseClient, settings: AggregationSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    fn skew(&self) -> i64 {
        if self.settings.skew_minutes > 0 {
            self.settings.skew_minutes
        } else {
            DEFAULT_SKEW_MINUTES
        }
    }
}

fn aggregation_err(pass: &str, e: clickhouse::error::Error) -> Error {
    Error::aggregation(format!("{} failed: {}", pass, e))
}

#[async_trait]
impl DowntimeService for ClickHouseAggregations {
    async fn upload_downtime(&self, params: &DowntimeParams) -> Result<()> {
        let params = params.with_default_skew();
        let start = Instant::now();

        self.client
            .inner()
            .query(MACHINE_DOWNTIME_SQL)
            .bind(self.settings.lookback_hours)
            .bind(params.min_duration_minutes)
            .bind(params.skew_minutes)
            .bind(params.energy_alert_kwh)
            .bind(params.energy_alert_minutes)
            .bind(params.machine_down_alert_minutes)
            .execute()
            .await
            .map_err(|e| aggregation_err("machine downtime", e))?;

        info!(
            min_duration = params.min_duration_minutes,
            skew = params.skew_minutes,
            latency_ms = %start.elapsed().as_millis(),
            "Machine downtime uploaded"
        );
        Ok(())
    }
}

#[async_trait]
impl EnergyService for ClickHouseAggregations {
    async fn calculate_line_downtime_energy(&self) -> Result<()> {
        let start = Instant::now();

        self.client
            .inner()
            .query(LINE_ENERGY_SQL)
            .bind(self.settings.lookback_hours)
            .bind(self.skew())
            .bind(self.settings.lookback_hours)
            .execute()
            .await
            .map_err(|e| aggregation_err("line energy", e))?;

        info!(latency_ms = %start.elapsed().as_millis(), "Line energy calculated");
        Ok(())
    }
}

#[async_trait]
impl LineDowntimeService for ClickHouseAggregations {
    async fn upload_line_downtime(&self) -> Result<()> {
        let start = Instant::now();

        self.client
            .inner()
            .query(LINE_DOWNTIME_SQL)
            .bind(self.settings.lookback_hours)
            .bind(self.settings.line_min_downtime_minutes)
            .bind(self.skew())
            .execute()
            .await
            .map_err(|e| aggregation_err("line downtime", e))?;

        info!(latency_ms = %start.elapsed().as_millis(), "Line downtime uploaded");
        Ok(())
    }
}
