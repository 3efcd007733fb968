//! Batch inserts of projected records.
//!
//! Records are grouped by type and each group is written with one INSERT.
//! Pulse records are not inserted here; they go through procedures.

use crate::client::ClickHouseClient;
use crate::schema::tables;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use engine_core::error::StoreErrorCode;
use engine_core::{
    AssemblyLineRecord, AssemblyStepRecord, EnergyRecord, Error, HealthRecord, PackingRecord,
    PersonCountRecord, PersonTrackingRecord, ProcessRecord, ProjectionRecord, RawDigitalRecord,
    RejectionRecord, Result, SiloRecord, SocialDistanceRecord,
};
use serde::Serialize;
use std::time::Instant;
use telemetry::metrics;
use tracing::debug;

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct ProcessRow {
    pub id: String,
    pub kind: String,
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub is_line: bool,
    pub cycle_time: f64,
    pub cooling_time: Option<String>,
    pub rpm: Option<String>,
    pub injection_time: Option<String>,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub refill_time: Option<String>,
    pub temperature: Option<String>,
    pub viscosity: Option<String>,
    pub pressure: Option<String>,
    pub current: Option<String>,
    pub vibration: Option<String>,
    pub concentration: Option<String>,
    pub throughput: Option<String>,
    pub weight_per_meter: Option<String>,
    pub input_flow: f64,
    pub input_material: f64,
    pub quantity: f64,
    pub flow_rate: f64,
    pub product: Option<String>,
    pub width: Option<String>,
    pub thickness: Option<String>,
    pub work_order_no: Option<String>,
    pub meter_per_minute: Option<String>,
    pub production: f64,
    pub pulses_per_minute: f64,
    pub is_process: bool,
    pub payload: String,
}

impl From<&ProcessRecord> for ProcessRow {
    fn from(r: &ProcessRecord) -> Self {
        Self {
            id: r.id.to_string(),
            kind: r.kind.clone(),
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            is_line: r.is_line,
            cycle_time: r.cycle_time,
            cooling_time: r.cooling_time.clone(),
            rpm: r.rpm.clone(),
            injection_time: r.injection_time.clone(),
            open_time: r.open_time.clone(),
            close_time: r.close_time.clone(),
            refill_time: r.refill_time.clone(),
            temperature: r.temperature.clone(),
            viscosity: r.viscosity.clone(),
            pressure: r.pressure.clone(),
            current: r.current.clone(),
            vibration: r.vibration.clone(),
            concentration: r.concentration.clone(),
            throughput: r.throughput.clone(),
            weight_per_meter: r.weight_per_meter.clone(),
            input_flow: r.input_flow,
            input_material: r.input_material,
            quantity: r.quantity,
            flow_rate: r.flow_rate,
            product: r.product.clone(),
            width: r.width.clone(),
            thickness: r.thickness.clone(),
            work_order_no: r.work_order_no.clone(),
            meter_per_minute: r.meter_per_minute.clone(),
            production: r.production,
            pulses_per_minute: r.pulses_per_minute,
            is_process: r.is_process,
            payload: r.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct PackingRow {
    pub kind: String,
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub cycle_time: f64,
    pub cooling_time: Option<String>,
    pub rpm: Option<String>,
    pub injection_time: Option<String>,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub refill_time: Option<String>,
    pub di1: Option<String>,
    pub di2: Option<String>,
    pub di3: Option<String>,
    pub di4: Option<String>,
    pub di5: Option<String>,
    pub di6: Option<String>,
    pub temperature: Option<String>,
    pub viscosity: Option<String>,
    pub pressure: Option<String>,
    pub current: Option<String>,
    pub vibration: Option<String>,
    pub concentration: Option<String>,
    pub is_process: bool,
    pub payload: String,
}

impl From<&PackingRecord> for PackingRow {
    fn from(r: &PackingRecord) -> Self {
        let [di1, di2, di3, di4, di5, di6] = r.digital_inputs.clone();
        Self {
            kind: r.kind.clone(),
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            cycle_time: r.cycle_time,
            cooling_time: r.cooling_time.clone(),
            rpm: r.rpm.clone(),
            injection_time: r.injection_time.clone(),
            open_time: r.open_time.clone(),
            close_time: r.close_time.clone(),
            refill_time: r.refill_time.clone(),
            di1,
            di2,
            di3,
            di4,
            di5,
            di6,
            temperature: r.temperature.clone(),
            viscosity: r.viscosity.clone(),
            pressure: r.pressure.clone(),
            current: r.current.clone(),
            vibration: r.vibration.clone(),
            concentration: r.concentration.clone(),
            is_process: r.is_process,
            payload: r.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct RejectionRow {
    pub kind: String,
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub cycle_time: f64,
    pub rejection_code: Option<String>,
    pub rejection_count: f64,
    pub is_line: bool,
    pub is_process: bool,
    pub payload: String,
}

impl From<&RejectionRecord> for RejectionRow {
    fn from(r: &RejectionRecord) -> Self {
        Self {
            kind: r.kind.clone(),
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            cycle_time: r.cycle_time,
            rejection_code: r.rejection_code.clone(),
            rejection_count: r.rejection_count,
            is_line: r.is_line,
            is_process: r.is_process,
            payload: r.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct HealthRow {
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub node_id: Option<String>,
    pub sensor_type: Option<String>,
    pub status: Option<String>,
    pub status_reason: Option<String>,
    pub plc_status: Option<String>,
    pub wifi_signal_strength: Option<String>,
}

impl From<&HealthRecord> for HealthRow {
    fn from(r: &HealthRecord) -> Self {
        Self {
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            node_id: r.node_id.clone(),
            sensor_type: r.sensor_type.clone(),
            status: r.status.clone(),
            status_reason: r.status_reason.clone(),
            plc_status: r.plc_status.clone(),
            wifi_signal_strength: r.wifi_signal_strength.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct EnergyRow {
    pub kind: String,
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub total_active_energy: Option<String>,
    pub total_reactive_energy: Option<String>,
    pub phase1_current: Option<String>,
    pub phase2_current: Option<String>,
    pub phase3_current: Option<String>,
    pub energy_duration: Option<f64>,
}

impl From<&EnergyRecord> for EnergyRow {
    fn from(r: &EnergyRecord) -> Self {
        Self {
            kind: r.kind.clone(),
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            total_active_energy: r.total_active_energy.clone(),
            total_reactive_energy: r.total_reactive_energy.clone(),
            phase1_current: r.phase1_current.clone(),
            phase2_current: r.phase2_current.clone(),
            phase3_current: r.phase3_current.clone(),
            energy_duration: r.energy_duration,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct RawDigitalRow {
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub di1: bool,
    pub di2: bool,
    pub di3: bool,
    pub di4: bool,
    pub di5: bool,
    pub di6: bool,
    pub a1: i64,
    pub a2: i64,
}

impl From<&RawDigitalRecord> for RawDigitalRow {
    fn from(r: &RawDigitalRecord) -> Self {
        let [di1, di2, di3, di4, di5, di6] = r.digital_inputs;
        Self {
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            di1,
            di2,
            di3,
            di4,
            di5,
            di6,
            a1: r.a1,
            a2: r.a2,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct SiloRow {
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub name: Option<String>,
    pub product: Option<String>,
    pub current_value: f64,
    pub max_weight: i32,
    pub min_weight: i32,
    pub urgent_weight: i32,
    pub reorder_weight: i32,
    pub percent_full: i32,
    pub usage_rate: Option<String>,
    pub normal_usage_rate: i32,
    pub minutes: i32,
    pub is_process: bool,
    pub payload: String,
}

impl From<&SiloRecord> for SiloRow {
    fn from(r: &SiloRecord) -> Self {
        Self {
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            name: r.name.clone(),
            product: r.product.clone(),
            current_value: r.current_value,
            max_weight: r.max_weight,
            min_weight: r.min_weight,
            urgent_weight: r.urgent_weight,
            reorder_weight: r.reorder_weight,
            percent_full: r.percent_full,
            usage_rate: r.usage_rate.clone(),
            normal_usage_rate: r.normal_usage_rate,
            minutes: r.minutes,
            is_process: r.is_process,
            payload: r.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct PersonTrackingRow {
    pub device_id: String,
    pub message_id: Option<String>,
    pub message_created: i64,
    pub record_created: i64,
    pub roi_id: Option<String>,
    pub tracker_id: Option<String>,
    pub confidence: Option<String>,
    pub object_id: Option<String>,
    pub time: Option<String>,
    pub x_axis: f64,
    pub y_axis: f64,
    pub helmet: Option<String>,
    pub jacket: Option<String>,
    pub jacket_color: Option<String>,
    pub body_temp: f64,
    pub check_in_time: Option<String>,
}

impl From<&PersonTrackingRecord> for PersonTrackingRow {
    fn from(r: &PersonTrackingRecord) -> Self {
        Self {
            device_id: r.device_id.clone(),
            message_id: r.message_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            roi_id: r.roi_id.clone(),
            tracker_id: r.tracker_id.clone(),
            confidence: r.confidence.clone(),
            object_id: r.object_id.clone(),
            time: r.time.clone(),
            x_axis: r.x_axis,
            y_axis: r.y_axis,
            helmet: r.helmet.clone(),
            jacket: r.jacket.clone(),
            jacket_color: r.jacket_color.clone(),
            body_temp: r.body_temp,
            check_in_time: r.check_in_time.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct PersonCountRow {
    pub device_id: String,
    pub message_id: Option<String>,
    pub message_created: i64,
    pub record_created: i64,
    pub roi_id: Option<String>,
    pub total_person_count: i64,
}

impl From<&PersonCountRecord> for PersonCountRow {
    fn from(r: &PersonCountRecord) -> Self {
        Self {
            device_id: r.device_id.clone(),
            message_id: r.message_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            roi_id: r.roi_id.clone(),
            total_person_count: r.total_person_count,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct SocialDistanceRow {
    pub device_id: String,
    pub message_id: Option<String>,
    pub message_created: i64,
    pub record_created: i64,
    pub roi_id: Option<String>,
    pub kind: Option<String>,
    pub location: String,
    pub time: Option<String>,
    pub person_count: i64,
    pub object_id: Option<String>,
}

impl From<&SocialDistanceRecord> for SocialDistanceRow {
    fn from(r: &SocialDistanceRecord) -> Self {
        Self {
            device_id: r.device_id.clone(),
            message_id: r.message_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            roi_id: r.roi_id.clone(),
            kind: r.kind.clone(),
            location: r.location.clone(),
            time: r.time.clone(),
            person_count: r.person_count,
            object_id: r.object_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct AssemblyLineRow {
    pub device_id: String,
    pub message_created: i64,
    pub record_created: i64,
    pub kind: Option<String>,
    pub equipment_id: Option<String>,
    pub assembly_cycle_time: Option<String>,
    pub assembly_image_url: Option<String>,
    pub station1_cycle_time: Option<String>,
    pub station1_image_url: Option<String>,
    pub station2_cycle_time: Option<String>,
    pub station2_image_url: Option<String>,
    pub station3_cycle_time: Option<String>,
    pub station3_image_url: Option<String>,
    pub station4_cycle_time: Option<String>,
    pub station4_image_url: Option<String>,
    pub station5_cycle_time: Option<String>,
    pub station5_image_url: Option<String>,
}

impl From<&AssemblyLineRecord> for AssemblyLineRow {
    fn from(r: &AssemblyLineRecord) -> Self {
        let [c1, c2, c3, c4, c5] = r.station_cycle_times.clone();
        let [i1, i2, i3, i4, i5] = r.station_image_urls.clone();
        Self {
            device_id: r.device_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            kind: r.kind.clone(),
            equipment_id: r.equipment_id.clone(),
            assembly_cycle_time: r.assembly_cycle_time.clone(),
            assembly_image_url: r.assembly_image_url.clone(),
            station1_cycle_time: c1,
            station1_image_url: i1,
            station2_cycle_time: c2,
            station2_image_url: i2,
            station3_cycle_time: c3,
            station3_image_url: i3,
            station4_cycle_time: c4,
            station4_image_url: i4,
            station5_cycle_time: c5,
            station5_image_url: i5,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct AssemblyStepRow {
    pub id: String,
    pub telemetry_id: String,
    pub device_id: String,
    pub camera_id: Option<String>,
    pub message_created: i64,
    pub record_created: i64,
    pub name: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub is_completed: bool,
    pub actual_counts: Vec<Option<i64>>,
    pub expected_counts: Vec<Option<i64>>,
}

impl From<&AssemblyStepRecord> for AssemblyStepRow {
    fn from(r: &AssemblyStepRecord) -> Self {
        Self {
            id: r.id.to_string(),
            telemetry_id: r.telemetry_id.to_string(),
            device_id: r.device_id.clone(),
            camera_id: r.camera_id.clone(),
            message_created: millis(r.message_created),
            record_created: millis(r.record_created),
            name: r.name.clone(),
            start_time: r.start_time.map(millis),
            end_time: r.end_time.map(millis),
            is_completed: r.is_completed,
            actual_counts: r.metadata.iter().map(|m| m.actual_count).collect(),
            expected_counts: r.metadata.iter().map(|m| m.expected_count).collect(),
        }
    }
}

/// Rows of one flush, grouped per table.
#[derive(Debug, Default)]
pub struct RowBatch {
    pub process: Vec<ProcessRow>,
    pub packing: Vec<PackingRow>,
    pub rejection: Vec<RejectionRow>,
    pub health: Vec<HealthRow>,
    pub energy: Vec<EnergyRow>,
    pub raw_digital: Vec<RawDigitalRow>,
    pub silo: Vec<SiloRow>,
    pub person_tracking: Vec<PersonTrackingRow>,
    pub person_count: Vec<PersonCountRow>,
    pub social_distance: Vec<SocialDistanceRow>,
    pub assembly_line: Vec<AssemblyLineRow>,
    pub assembly_step: Vec<AssemblyStepRow>,
    /// Pulse records handed to `insert_many`; they are not table rows.
    pub skipped: usize,
}

impl RowBatch {
    pub fn from_records(records: &[ProjectionRecord]) -> Self {
        let mut batch = Self::default();
        for record in records {
            match record {
                ProjectionRecord::Process(r) => batch.process.push(r.into()),
                ProjectionRecord::Packing(r) => batch.packing.push(r.into()),
                ProjectionRecord::Rejection(r) => batch.rejection.push(r.into()),
                ProjectionRecord::Health(r) => batch.health.push(r.into()),
                ProjectionRecord::Energy(r) => batch.energy.push(r.into()),
                ProjectionRecord::RawDigital(r) => batch.raw_digital.push(r.into()),
                ProjectionRecord::Silo(r) => batch.silo.push(r.into()),
                ProjectionRecord::PersonTracking(r) => batch.person_tracking.push(r.into()),
                ProjectionRecord::PersonCount(r) => batch.person_count.push(r.into()),
                ProjectionRecord::SocialDistance(r) => batch.social_distance.push(r.into()),
                ProjectionRecord::AssemblyLine(r) => batch.assembly_line.push(r.into()),
                ProjectionRecord::AssemblyStep(r) => batch.assembly_step.push(r.into()),
                ProjectionRecord::Pulse(_) => batch.skipped += 1,
            }
        }
        batch
    }

    pub fn row_count(&self) -> usize {
        self.process.len()
            + self.packing.len()
            + self.rejection.len()
            + self.health.len()
            + self.energy.len()
            + self.raw_digital.len()
            + self.silo.len()
            + self.person_tracking.len()
            + self.person_count.len()
            + self.social_distance.len()
            + self.assembly_line.len()
            + self.assembly_step.len()
    }
}

/// Writes `rows` into `table` with a single INSERT.
pub async fn insert_rows<T>(client: &ClickHouseClient, table: &str, rows: &[T]) -> Result<usize>
where
    T: Row + Serialize,
{
    if rows.is_empty() {
        return Ok(0);
    }

    let insert_err = |stage: &str, e: clickhouse::error::Error| {
        Error::storage(
            StoreErrorCode::InsertFailed,
            format!("{} failed for {}: {}", stage, table, e),
        )
    };

    let mut insert = client
        .inner()
        .insert(table)
        .map_err(|e| insert_err("insert", e))?;
    for row in rows {
        insert.write(row).await.map_err(|e| insert_err("write", e))?;
    }
    insert.end().await.map_err(|e| insert_err("end", e))?;

    Ok(rows.len())
}

/// Inserts every non-pulse record, one INSERT per table.
///
/// Tables are written in a fixed order. A failure stops the flush; tables
/// written before it keep their rows.
pub async fn insert_records(client: &ClickHouseClient, records: &[ProjectionRecord]) -> Result<usize> {
    let batch = RowBatch::from_records(records);
    let start = Instant::now();

    let mut written = 0;
    written += insert_rows(client, tables::PROCESS, &batch.process).await?;
    written += insert_rows(client, tables::PACKING, &batch.packing).await?;
    written += insert_rows(client, tables::REJECTION, &batch.rejection).await?;
    written += insert_rows(client, tables::HEALTH, &batch.health).await?;
    written += insert_rows(client, tables::ENERGY, &batch.energy).await?;
    written += insert_rows(client, tables::RAW_DIGITAL, &batch.raw_digital).await?;
    written += insert_rows(client, tables::SILO, &batch.silo).await?;
    written += insert_rows(client, tables::PERSON_TRACKING, &batch.person_tracking).await?;
    written += insert_rows(client, tables::PERSON_COUNT, &batch.person_count).await?;
    written += insert_rows(client, tables::SOCIAL_DISTANCE, &batch.social_distance).await?;
    written += insert_rows(client, tables::ASSEMBLY_LINE, &batch.assembly_line).await?;
    written += insert_rows(client, tables::ASSEMBLY_STEP, &batch.assembly_step).await?;

    let elapsed = start.elapsed();
    metrics().flush_latency_ms.observe(elapsed.as_millis() as u64);
    debug!(
        rows = written,
        skipped = batch.skipped,
        latency_ms = %elapsed.as_millis(),
        "Inserted records into ClickHouse"
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use engine_core::{PulseRecord, PulseTarget, StepMetadata};
    use uuid::Uuid;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_rows_grouped_by_table() {
        let records = vec![
            ProjectionRecord::Process(ProcessRecord {
                device_id: "press-01".into(),
                message_created: ts(),
                record_created: ts(),
                ..ProcessRecord::default()
            }),
            ProjectionRecord::Process(ProcessRecord::default()),
            ProjectionRecord::Health(HealthRecord::default()),
            ProjectionRecord::Pulse(PulseRecord {
                target: PulseTarget::Device,
                kind: "Pulse".into(),
                device_id: "press-01".into(),
                message_created: ts(),
                record_created: ts(),
                pulses: 1,
                duration: 0,
                payload: "{}".into(),
            }),
        ];

        let batch = RowBatch::from_records(&records);
        assert_eq!(batch.process.len(), 2);
        assert_eq!(batch.health.len(), 1);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.row_count(), 3);
        assert_eq!(batch.process[0].message_created, ts().timestamp_millis());
    }

    #[test]
    fn test_step_metadata_flattened() {
        let header = Uuid::new_v4();
        let step = AssemblyStepRecord {
            telemetry_id: header,
            metadata: vec![
                StepMetadata { actual_count: Some(2), expected_count: Some(4) },
                StepMetadata { actual_count: None, expected_count: Some(1) },
            ],
            ..AssemblyStepRecord::default()
        };

        let row = AssemblyStepRow::from(&step);
        assert_eq!(row.telemetry_id, header.to_string());
        assert_eq!(row.actual_counts, vec![Some(2), None]);
        assert_eq!(row.expected_counts, vec![Some(4), Some(1)]);
    }
}
