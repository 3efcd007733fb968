//! ClickHouse table schemas.
//!
//! Conventions:
//! - Table names are unqualified; the client selects the database
//! - DateTime64(3, 'UTC') for every timestamp
//! - LowCardinality for kind and status columns
//! - ReplacingMergeTree where a row may be written more than once

use crate::client::ClickHouseClient;
use engine_core::Result;
use tracing::debug;

/// Table names.
pub mod tables {
    pub const PULSE: &str = "pulse_telemetry";
    pub const LINE_PULSE: &str = "line_pulse_telemetry";
    pub const PROCESS: &str = "process_telemetry";
    pub const PACKING: &str = "packing_telemetry";
    pub const REJECTION: &str = "rejection_telemetry";
    pub const HEALTH: &str = "health_telemetry";
    pub const ENERGY: &str = "energy_telemetry";
    pub const RAW_DIGITAL: &str = "raw_telemetry";
    pub const SILO: &str = "silo_telemetry";
    pub const PERSON_TRACKING: &str = "vision_telemetry";
    pub const PERSON_COUNT: &str = "person_count_telemetry";
    pub const SOCIAL_DISTANCE: &str = "social_distance_telemetry";
    pub const ASSEMBLY_LINE: &str = "assembly_line_telemetry";
    pub const ASSEMBLY_STEP: &str = "assembly_step_telemetry";
    pub const CHECKPOINTS: &str = "partition_checkpoints";
    pub const MACHINE_DOWNTIME: &str = "machine_downtimes";
    pub const LINE_ENERGY: &str = "line_energy";
    pub const LINE_DOWNTIME: &str = "line_downtimes";
}

pub const CREATE_PULSE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pulse_telemetry (
    kind LowCardinality(String),
    device_id String,
    message_created DateTime64(3, 'UTC'),
    pulses Int64,
    duration Int64,
    payload String,
    created_at DateTime64(3, 'UTC') DEFAULT now64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_LINE_PULSE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS line_pulse_telemetry (
    kind LowCardinality(String),
    device_id String,
    message_created DateTime64(3, 'UTC'),
    pulses Int64,
    duration Int64,
    is_line Bool,
    payload String,
    created_at DateTime64(3, 'UTC') DEFAULT now64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

/// Process readings. Most tag fields arrive as text and are kept that way.
pub const CREATE_PROCESS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS process_telemetry (
    id String,
    kind LowCardinality(String),
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    is_line Bool,
    cycle_time Float64,
    cooling_time Nullable(String),
    rpm Nullable(String),
    injection_time Nullable(String),
    open_time Nullable(String),
    close_time Nullable(String),
    refill_time Nullable(String),
    temperature Nullable(String),
    viscosity Nullable(String),
    pressure Nullable(String),
    current Nullable(String),
    vibration Nullable(String),
    concentration Nullable(String),
    throughput Nullable(String),
    weight_per_meter Nullable(String),
    input_flow Float64,
    input_material Float64,
    quantity Float64,
    flow_rate Float64,
    product Nullable(String),
    width Nullable(String),
    thickness Nullable(String),
    work_order_no Nullable(String),
    meter_per_minute Nullable(String),
    production Float64,
    pulses_per_minute Float64,
    is_process Bool,
    payload String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_PACKING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS packing_telemetry (
    kind LowCardinality(String),
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    cycle_time Float64,
    cooling_time Nullable(String),
    rpm Nullable(String),
    injection_time Nullable(String),
    open_time Nullable(String),
    close_time Nullable(String),
    refill_time Nullable(String),
    di1 Nullable(String),
    di2 Nullable(String),
    di3 Nullable(String),
    di4 Nullable(String),
    di5 Nullable(String),
    di6 Nullable(String),
    temperature Nullable(String),
    viscosity Nullable(String),
    pressure Nullable(String),
    current Nullable(String),
    vibration Nullable(String),
    concentration Nullable(String),
    is_process Bool,
    payload String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_REJECTION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rejection_telemetry (
    kind LowCardinality(String),
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    cycle_time Float64,
    rejection_code Nullable(String),
    rejection_count Float64,
    is_line Bool,
    is_process Bool,
    payload String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_HEALTH_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS health_telemetry (
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    node_id Nullable(String),
    sensor_type Nullable(String),
    status LowCardinality(Nullable(String)),
    status_reason Nullable(String),
    plc_status Nullable(String),
    wifi_signal_strength Nullable(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
TTL toDateTime(message_created) + INTERVAL 180 DAY
"#;

/// Energy meter readings. `total_active_energy` is a cumulative kWh counter.
pub const CREATE_ENERGY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS energy_telemetry (
    kind LowCardinality(String),
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    total_active_energy Nullable(String),
    total_reactive_energy Nullable(String),
    phase1_current Nullable(String),
    phase2_current Nullable(String),
    phase3_current Nullable(String),
    energy_duration Nullable(Float64)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_RAW_DIGITAL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS raw_telemetry (
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    di1 Bool,
    di2 Bool,
    di3 Bool,
    di4 Bool,
    di5 Bool,
    di6 Bool,
    a1 Int64,
    a2 Int64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_SILO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS silo_telemetry (
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    name Nullable(String),
    product Nullable(String),
    current_value Float64,
    max_weight Int32,
    min_weight Int32,
    urgent_weight Int32,
    reorder_weight Int32,
    percent_full Int32,
    usage_rate Nullable(String),
    normal_usage_rate Int32,
    minutes Int32,
    is_process Bool,
    payload String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

pub const CREATE_PERSON_TRACKING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS vision_telemetry (
    device_id String,
    message_id Nullable(String),
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    roi_id Nullable(String),
    tracker_id Nullable(String),
    confidence Nullable(String),
    object_id Nullable(String),
    time Nullable(String),
    x_axis Float64,
    y_axis Float64,
    helmet Nullable(String),
    jacket Nullable(String),
    jacket_color Nullable(String),
    body_temp Float64,
    check_in_time Nullable(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
TTL toDateTime(message_created) + INTERVAL 90 DAY
"#;

pub const CREATE_PERSON_COUNT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS person_count_telemetry (
    device_id String,
    message_id Nullable(String),
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    roi_id Nullable(String),
    total_person_count Int64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
TTL toDateTime(message_created) + INTERVAL 90 DAY
"#;

pub const CREATE_SOCIAL_DISTANCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS social_distance_telemetry (
    device_id String,
    message_id Nullable(String),
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    roi_id Nullable(String),
    kind Nullable(String),
    location String,
    time Nullable(String),
    person_count Int64,
    object_id Nullable(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
TTL toDateTime(message_created) + INTERVAL 90 DAY
"#;

pub const CREATE_ASSEMBLY_LINE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS assembly_line_telemetry (
    device_id String,
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    kind Nullable(String),
    equipment_id Nullable(String),
    assembly_cycle_time Nullable(String),
    assembly_image_url Nullable(String),
    station1_cycle_time Nullable(String),
    station1_image_url Nullable(String),
    station2_cycle_time Nullable(String),
    station2_image_url Nullable(String),
    station3_cycle_time Nullable(String),
    station3_image_url Nullable(String),
    station4_cycle_time Nullable(String),
    station4_image_url Nullable(String),
    station5_cycle_time Nullable(String),
    station5_image_url Nullable(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (device_id, message_created)
"#;

/// Steps reference `process_telemetry.id` through `telemetry_id`.
pub const CREATE_ASSEMBLY_STEP_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS assembly_step_telemetry (
    id String,
    telemetry_id String,
    device_id String,
    camera_id Nullable(String),
    message_created DateTime64(3, 'UTC'),
    record_created DateTime64(3, 'UTC'),
    name Nullable(String),
    start_time Nullable(DateTime64(3, 'UTC')),
    end_time Nullable(DateTime64(3, 'UTC')),
    is_completed Bool,
    actual_counts Array(Nullable(Int64)),
    expected_counts Array(Nullable(Int64))
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(message_created)
ORDER BY (telemetry_id, message_created)
"#;

/// Partition checkpoints. The newest `updated_at` wins.
pub const CREATE_CHECKPOINTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS partition_checkpoints (
    stream String,
    consumer_group String,
    partition_id Int32,
    committed_offset Int64,
    sequence_number Int64,
    updated_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (stream, consumer_group, partition_id)
"#;

pub const CREATE_MACHINE_DOWNTIME_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS machine_downtimes (
    device_id String,
    started_at DateTime64(3, 'UTC'),
    ended_at DateTime64(3, 'UTC'),
    duration_minutes Float64,
    energy_kwh Float64,
    energy_alert Bool,
    machine_down_alert Bool,
    computed_at DateTime64(3, 'UTC') DEFAULT now64(3)
)
ENGINE = ReplacingMergeTree(computed_at)
PARTITION BY toYYYYMM(started_at)
ORDER BY (device_id, started_at)
"#;

pub const CREATE_LINE_ENERGY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS line_energy (
    device_id String,
    minute DateTime('UTC'),
    energy_kwh Float64,
    computed_at DateTime64(3, 'UTC') DEFAULT now64(3)
)
ENGINE = ReplacingMergeTree(computed_at)
PARTITION BY toYYYYMM(minute)
ORDER BY (device_id, minute)
"#;

pub const CREATE_LINE_DOWNTIME_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS line_downtimes (
    device_id String,
    started_at DateTime64(3, 'UTC'),
    ended_at DateTime64(3, 'UTC'),
    duration_minutes Float64,
    energy_kwh Float64,
    computed_at DateTime64(3, 'UTC') DEFAULT now64(3)
)
ENGINE = ReplacingMergeTree(computed_at)
PARTITION BY toYYYYMM(started_at)
ORDER BY (device_id, started_at)
"#;

/// All DDL statements in creation order.
pub fn all_tables() -> &'static [&'static str] {
    &[
        CREATE_PULSE_TABLE,
        CREATE_LINE_PULSE_TABLE,
        CREATE_PROCESS_TABLE,
        CREATE_PACKING_TABLE,
        CREATE_REJECTION_TABLE,
        CREATE_HEALTH_TABLE,
        CREATE_ENERGY_TABLE,
        CREATE_RAW_DIGITAL_TABLE,
        CREATE_SILO_TABLE,
        CREATE_PERSON_TRACKING_TABLE,
        CREATE_PERSON_COUNT_TABLE,
        CREATE_SOCIAL_DISTANCE_TABLE,
        CREATE_ASSEMBLY_LINE_TABLE,
        CREATE_ASSEMBLY_STEP_TABLE,
        CREATE_CHECKPOINTS_TABLE,
        CREATE_MACHINE_DOWNTIME_TABLE,
        CREATE_LINE_ENERGY_TABLE,
        CREATE_LINE_DOWNTIME_TABLE,
    ]
}

/// Creates every table that does not exist yet.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for sql in all_tables() {
        client.inner().query(sql).execute().await.map_err(|e| {
            engine_core::Error::configuration(format!("schema init error: {}", e))
        })?;
    }
    debug!(tables = all_tables().len(), "ClickHouse schema initialized");
    Ok(())
}
