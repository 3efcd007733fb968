//! Typed records produced by projection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::envelope::StepMetadata;
use crate::store::{ProcedureCall, ProcedureParam};

/// Procedure recording a line-level pulse.
pub const LINE_PULSE_PROCEDURE: &str = "insert_line_pulse_telemetry";
/// Procedure recording a device-level pulse.
pub const DEVICE_PULSE_PROCEDURE: &str = "insert_pulse_telemetry";

/// Which pulse procedure a record targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseTarget {
    Line,
    Device,
}

/// Machine pulse count over a reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseRecord {
    pub target: PulseTarget,
    pub kind: String,
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub pulses: i64,
    pub duration: i64,
    /// Envelope JSON with the `cycletime` placeholder tag appended.
    pub payload: String,
}

impl PulseRecord {
    /// Builds the stored procedure call for this pulse.
    pub fn procedure_call(&self) -> ProcedureCall {
        let created = self.message_created.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut call = match self.target {
            PulseTarget::Line => ProcedureCall::new(LINE_PULSE_PROCEDURE),
            PulseTarget::Device => ProcedureCall::new(DEVICE_PULSE_PROCEDURE),
        };
        call = call
            .param(ProcedureParam::Str(self.kind.clone()))
            .param(ProcedureParam::Str(self.device_id.clone()))
            .param(ProcedureParam::Str(created))
            .param(ProcedureParam::Int(self.pulses))
            .param(ProcedureParam::Int(self.duration));
        if self.target == PulseTarget::Line {
            call = call.param(ProcedureParam::Bool(true));
        }
        call.param(ProcedureParam::Str(self.payload.clone()))
    }
}

/// Generic process reading (PLC, valves, sensors, extrusion and meter profiles).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub id: Uuid,
    pub kind: String,
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
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

/// Packing machine reading with digital inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackingRecord {
    pub kind: String,
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub cycle_time: f64,
    pub cooling_time: Option<String>,
    pub rpm: Option<String>,
    pub injection_time: Option<String>,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub refill_time: Option<String>,
    pub digital_inputs: [Option<String>; 6],
    pub temperature: Option<String>,
    pub viscosity: Option<String>,
    pub pressure: Option<String>,
    pub current: Option<String>,
    pub vibration: Option<String>,
    pub concentration: Option<String>,
    pub is_process: bool,
    pub payload: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RejectionRecord {
    pub kind: String,
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub cycle_time: f64,
    pub rejection_code: Option<String>,
    pub rejection_count: f64,
    pub is_line: bool,
    pub is_process: bool,
    pub payload: String,
}

/// Gateway / node health report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthRecord {
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub node_id: Option<String>,
    pub sensor_type: Option<String>,
    pub status: Option<String>,
    pub status_reason: Option<String>,
    pub plc_status: Option<String>,
    pub wifi_signal_strength: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyRecord {
    pub kind: String,
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub total_active_energy: Option<String>,
    pub total_reactive_energy: Option<String>,
    pub phase1_current: Option<String>,
    pub phase2_current: Option<String>,
    pub phase3_current: Option<String>,
    pub energy_duration: Option<f64>,
}

/// Raw digital and analog inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawDigitalRecord {
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub digital_inputs: [bool; 6],
    pub a1: i64,
    pub a2: i64,
}

/// Silo fill level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiloRecord {
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
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

/// A person seen by a camera, or a bare position sample on a pathway.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonTrackingRecord {
    pub device_id: String,
    pub message_id: Option<String>,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
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

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonCountRecord {
    pub device_id: String,
    pub message_id: Option<String>,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub roi_id: Option<String>,
    pub total_person_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SocialDistanceRecord {
    pub device_id: String,
    pub message_id: Option<String>,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub roi_id: Option<String>,
    pub kind: Option<String>,
    pub location: String,
    pub time: Option<String>,
    pub person_count: i64,
    pub object_id: Option<String>,
}

/// Assembly line cycle header with per-station snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyLineRecord {
    pub device_id: String,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub kind: Option<String>,
    pub equipment_id: Option<String>,
    pub assembly_cycle_time: Option<String>,
    pub assembly_image_url: Option<String>,
    pub station_cycle_times: [Option<String>; 5],
    pub station_image_urls: [Option<String>; 5],
}

/// One step of a vision assembly process, linked to its process header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyStepRecord {
    pub id: Uuid,
    pub telemetry_id: Uuid,
    pub device_id: String,
    pub camera_id: Option<String>,
    pub message_created: DateTime<Utc>,
    pub record_created: DateTime<Utc>,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub metadata: Vec<StepMetadata>,
}

/// A record staged for storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum ProjectionRecord {
    Pulse(PulseRecord),
    Process(ProcessRecord),
    Packing(PackingRecord),
    Rejection(RejectionRecord),
    Health(HealthRecord),
    Energy(EnergyRecord),
    RawDigital(RawDigitalRecord),
    Silo(SiloRecord),
    PersonTracking(PersonTrackingRecord),
    PersonCount(PersonCountRecord),
    SocialDistance(SocialDistanceRecord),
    AssemblyLine(AssemblyLineRecord),
    AssemblyStep(AssemblyStepRecord),
}

impl ProjectionRecord {
    /// Short record name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pulse(_) => "pulse",
            Self::Process(_) => "process",
            Self::Packing(_) => "packing",
            Self::Rejection(_) => "rejection",
            Self::Health(_) => "health",
            Self::Energy(_) => "energy",
            Self::RawDigital(_) => "raw_digital",
            Self::Silo(_) => "silo",
            Self::PersonTracking(_) => "person_tracking",
            Self::PersonCount(_) => "person_count",
            Self::SocialDistance(_) => "social_distance",
            Self::AssemblyLine(_) => "assembly_line",
            Self::AssemblyStep(_) => "assembly_step",
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::Pulse(r) => &r.device_id,
            Self::Process(r) => &r.device_id,
            Self::Packing(r) => &r.device_id,
            Self::Rejection(r) => &r.device_id,
            Self::Health(r) => &r.device_id,
            Self::Energy(r) => &r.device_id,
            Self::RawDigital(r) => &r.device_id,
            Self::Silo(r) => &r.device_id,
            Self::PersonTracking(r) => &r.device_id,
            Self::PersonCount(r) => &r.device_id,
            Self::SocialDistance(r) => &r.device_id,
            Self::AssemblyLine(r) => &r.device_id,
            Self::AssemblyStep(r) => &r.device_id,
        }
    }

    pub fn message_created(&self) -> DateTime<Utc> {
        match self {
            Self::Pulse(r) => r.message_created,
            Self::Process(r) => r.message_created,
            Self::Packing(r) => r.message_created,
            Self::Rejection(r) => r.message_created,
            Self::Health(r) => r.message_created,
            Self::Energy(r) => r.message_created,
            Self::RawDigital(r) => r.message_created,
            Self::Silo(r) => r.message_created,
            Self::PersonTracking(r) => r.message_created,
            Self::PersonCount(r) => r.message_created,
            Self::SocialDistance(r) => r.message_created,
            Self::AssemblyLine(r) => r.message_created,
            Self::AssemblyStep(r) => r.message_created,
        }
    }

    pub fn record_created(&self) -> DateTime<Utc> {
        match self {
            Self::Pulse(r) => r.record_created,
            Self::Process(r) => r.record_created,
            Self::Packing(r) => r.record_created,
            Self::Rejection(r) => r.record_created,
            Self::Health(r) => r.record_created,
            Self::Energy(r) => r.record_created,
            Self::RawDigital(r) => r.record_created,
            Self::Silo(r) => r.record_created,
            Self::PersonTracking(r) => r.record_created,
            Self::PersonCount(r) => r.record_created,
            Self::SocialDistance(r) => r.record_created,
            Self::AssemblyLine(r) => r.record_created,
            Self::AssemblyStep(r) => r.record_created,
        }
    }

    pub fn is_pulse(&self) -> bool {
        matches!(self, Self::Pulse(_))
    }
}
