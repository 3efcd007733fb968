//! Envelope to record projection.
//!
//! One decoded envelope yields zero or more [`ProjectionRecord`]s. Routing is
//! an exhaustive match on [`SchemaKind`]. Secondary schemas (health, energy,
//! vision, assembly) are decoded again from the raw payload.

use chrono::{DateTime, Utc};
use engine_core::payloads::{AssemblyPayload, EnergyPayload, HealthPayload, VisionPayload};
use engine_core::{
    AssemblyLineRecord, AssemblyStepRecord, EnergyRecord, Error, HealthRecord, PackingRecord,
    PersonCountRecord, PersonTrackingRecord, ProcessRecord, ProjectionRecord, PulseRecord,
    PulseTarget, RawDigitalRecord, RejectionRecord, Result, SchemaKind, SiloRecord,
    SocialDistanceRecord, Tag, TelemetryEnvelope,
};
use serde::de::DeserializeOwned;
use telemetry::metrics;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Placeholder appended to pulse payloads; the procedure fills in the value.
const CYCLE_TIME_PLACEHOLDER: &str = "{cycleTimeValue}";

/// Stateless projector. Reads the clock for `record_created` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector;

impl Projector {
    pub fn new() -> Self {
        Self
    }

    pub fn project(&self, envelope: &TelemetryEnvelope, raw: &[u8]) -> Result<Vec<ProjectionRecord>> {
        self.project_at(envelope, raw, Utc::now())
    }

    /// Projects with an explicit ingestion time.
    pub fn project_at(
        &self,
        envelope: &TelemetryEnvelope,
        raw: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<ProjectionRecord>> {
        let ctx = Context {
            envelope,
            raw,
            now,
        };

        let records = match &envelope.kind {
            SchemaKind::Pulse => ctx.pulse()?.into_iter().collect(),
            SchemaKind::Plc
            | SchemaKind::Valves
            | SchemaKind::Sensor
            | SchemaKind::TxPlEmDai
            | SchemaKind::TxKgEmDai => vec![ProjectionRecord::Process(ctx.machine_process())],
            SchemaKind::TxKgEmIsp => vec![ProjectionRecord::Process(ctx.extrusion_job())],
            SchemaKind::TxKgEmEsp => vec![ProjectionRecord::Process(ctx.extrusion_flow())],
            SchemaKind::TxLnEmDai => vec![ProjectionRecord::Process(ctx.line_meter())],
            SchemaKind::Packing => vec![ProjectionRecord::Packing(ctx.packing())],
            SchemaKind::RejectionPulse => vec![ProjectionRecord::Rejection(ctx.rejection())],
            SchemaKind::Health => vec![ProjectionRecord::Health(ctx.health()?)],
            SchemaKind::Energy | SchemaKind::EnergyOnDevice | SchemaKind::EnergyOnMeter => {
                vec![ProjectionRecord::Energy(ctx.energy()?)]
            }
            SchemaKind::RawDigital => vec![ProjectionRecord::RawDigital(ctx.raw_digital())],
            SchemaKind::Silos => vec![ProjectionRecord::Silo(ctx.silo())],
            SchemaKind::Vision => ctx.vision()?,
            SchemaKind::Temperature => {
                info!(device_id = %envelope.device_id, "Ambient temperature telemetry received");
                Vec::new()
            }
            SchemaKind::Assembly => vec![ProjectionRecord::AssemblyLine(ctx.assembly()?)],
            SchemaKind::VisionAssembly => ctx.vision_assembly(),
            SchemaKind::Unknown(name) => {
                metrics().unknown_kinds.inc();
                warn!(device_id = %envelope.device_id, kind = %name, "Unknown telemetry kind");
                Vec::new()
            }
        };

        debug!(
            device_id = %envelope.device_id,
            kind = %envelope.kind,
            records = records.len(),
            "Projected telemetry"
        );
        Ok(records)
    }
}

struct Context<'a> {
    envelope: &'a TelemetryEnvelope,
    raw: &'a [u8],
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    fn payload_text(&self) -> String {
        String::from_utf8_lossy(self.raw).into_owned()
    }

    fn secondary<T: DeserializeOwned>(&self, schema: &str) -> Result<T> {
        serde_json::from_slice(self.raw).map_err(|e| {
            Error::projection(format!(
                "invalid {} payload from {}: {}",
                schema, self.envelope.device_id, e
            ))
        })
    }

    fn tag(&self, name: &str) -> Option<String> {
        self.envelope.tag_string(name)
    }

    fn pulse(&self) -> Result<Option<ProjectionRecord>> {
        let env = self.envelope;
        let pulses = env.tag_i64("pulses").unwrap_or(0);
        let duration = env.tag_i64("duration").unwrap_or(0);
        if pulses <= 0 {
            debug!(device_id = %env.device_id, pulses, "Skipping pulse without count");
            return Ok(None);
        }

        let mut stamped = env.clone();
        stamped.tags.push(Tag {
            name: Some("cycletime".to_string()),
            label: Some("cycletime".to_string()),
            tag_type: Some("machine".to_string()),
            address: None,
            value: Some(CYCLE_TIME_PLACEHOLDER.to_string()),
        });
        let payload = serde_json::to_string(&stamped)?;

        Ok(Some(ProjectionRecord::Pulse(PulseRecord {
            target: if env.is_line {
                PulseTarget::Line
            } else {
                PulseTarget::Device
            },
            kind: env.kind.as_str().to_string(),
            device_id: env.device_id.clone(),
            message_created: env.created,
            record_created: self.now,
            pulses,
            duration,
            payload,
        })))
    }

    fn base_process(&self) -> ProcessRecord {
        let env = self.envelope;
        ProcessRecord {
            id: Uuid::new_v4(),
            kind: env.kind.as_str().to_string(),
            device_id: env.device_id.clone(),
            message_created: env.created,
            record_created: self.now,
            cycle_time: env.cycle_time(),
            production: 1.0,
            payload: self.payload_text(),
            ..ProcessRecord::default()
        }
    }

    /// PLC, valves, sensors and the DAI device profiles.
    fn machine_process(&self) -> ProcessRecord {
        ProcessRecord {
            is_line: self.envelope.is_line,
            cooling_time: self.tag("coolingtime"),
            rpm: self.tag("pulses"),
            injection_time: self.tag("injectiontime"),
            open_time: self.tag("opentime"),
            close_time: self.tag("closetime"),
            refill_time: self.tag("refilltime"),
            temperature: self.tag("Temperature"),
            viscosity: self.tag("AmpsReading"),
            pressure: self.tag("Pressure"),
            current: self.tag("Current"),
            vibration: self.tag("RPM"),
            concentration: self.tag("concentration"),
            ..self.base_process()
        }
    }

    fn extrusion_job(&self) -> ProcessRecord {
        let env = self.envelope;
        ProcessRecord {
            throughput: self.tag("Throughput"),
            weight_per_meter: self.tag("WeightPerMeter"),
            input_flow: env.tag_positive_f64("Input flow"),
            input_material: env.tag_positive_f64("Input material"),
            quantity: env.tag_positive_f64("Quantity"),
            product: self.tag("Product"),
            flow_rate: env.tag_positive_f64("Flow rate"),
            width: self.tag("Width"),
            thickness: self.tag("Thickness"),
            work_order_no: self.tag("WorkOrderNo"),
            meter_per_minute: self.tag("meterpermintue"),
            ..self.base_process()
        }
    }

    fn extrusion_flow(&self) -> ProcessRecord {
        let env = self.envelope;
        ProcessRecord {
            input_flow: env.tag_positive_f64("Input flow"),
            input_material: env.tag_positive_f64("Input material"),
            flow_rate: env.tag_positive_f64("Flow rate"),
            production: env.tag_positive_f64("Production"),
            ..self.base_process()
        }
    }

    fn line_meter(&self) -> ProcessRecord {
        ProcessRecord {
            meter_per_minute: self.tag("meter_per_minute"),
            ..self.base_process()
        }
    }

    fn packing(&self) -> PackingRecord {
        let env = self.envelope;
        PackingRecord {
            kind: env.kind.as_str().to_string(),
            device_id: env.device_id.clone(),
            message_created: env.created,
            record_created: self.now,
            cycle_time: env.cycle_time(),
            cooling_time: self.tag("coolingtime"),
            rpm: self.tag("pulses"),
            injection_time: self.tag("injectiontime"),
            open_time: self.tag("opentime"),
            close_time: self.tag("closetime"),
            refill_time: self.tag("refilltime"),
            digital_inputs: ["DI1", "DI2", "DI3", "DI4", "DI5", "DI6"].map(|name| self.tag(name)),
            temperature: self.tag("Temperature"),
            viscosity: self.tag("AmpsReading"),
            pressure: self.tag("Pressure"),
            current: self.tag("Current"),
            vibration: self.tag("RPM"),
            concentration: self.tag("concentration"),
            is_process: false,
            payload: self.payload_text(),
        }
    }

    fn rejection(&self) -> RejectionRecord {
        let env = self.envelope;
        RejectionRecord {
            kind: env.kind.as_str().to_string(),
            device_id: env.device_id.clone(),
            message_created: env.created,
            record_created: self.now,
            cycle_time: env.cycle_time(),
            rejection_code: self.tag("rejectioncode"),
            rejection_count: env.tag_f64("rejectioncount").unwrap_or(0.0),
            is_line: env.is_line,
            is_process: false,
            payload: self.payload_text(),
        }
    }

    fn health(&self) -> Result<HealthRecord> {
        let payload: HealthPayload = self.secondary("health")?;
        Ok(HealthRecord {
            device_id: payload
                .device_id
                .unwrap_or_else(|| self.envelope.device_id.clone()),
            message_created: payload.created.unwrap_or(self.envelope.created),
            record_created: self.now,
            node_id: payload.node_id,
            sensor_type: payload.sensor_type,
            status: payload.status,
            status_reason: payload.status_reason,
            plc_status: payload.plc_status,
            wifi_signal_strength: payload
                .device_information
                .and_then(|info| info.wi_fi_signal_strength),
        })
    }

    fn energy(&self) -> Result<EnergyRecord> {
        let payload: EnergyPayload = self.secondary("energy")?;
        let record = EnergyRecord {
            kind: self.envelope.kind.as_str().to_string(),
            device_id: payload
                .device_id
                .unwrap_or_else(|| self.envelope.device_id.clone()),
            message_created: payload.created.unwrap_or(self.envelope.created),
            record_created: self.now,
            total_active_energy: self.tag("TotalActiveEnergy"),
            total_reactive_energy: self.tag("TotalReactiveEnergy"),
            phase1_current: self.tag("Phase1Current"),
            phase2_current: self.tag("Phase2Current"),
            phase3_current: self.tag("Phase3Current"),
            energy_duration: payload.energy_duration,
        };

        if record.total_active_energy.as_deref().map_or(true, str::is_empty) {
            warn!(device_id = %record.device_id, "Energy telemetry without active energy total");
        }
        Ok(record)
    }

    fn raw_digital(&self) -> RawDigitalRecord {
        let env = self.envelope;
        RawDigitalRecord {
            device_id: env.device_id.clone(),
            message_created: env.created,
            record_created: self.now,
            digital_inputs: ["DI1", "DI2", "DI3", "DI4", "DI5", "DI6"]
                .map(|name| env.tag_bool(name).unwrap_or(false)),
            a1: env.tag_i64("A1").unwrap_or(0),
            a2: env.tag_i64("A2").unwrap_or(0),
        }
    }

    fn silo(&self) -> SiloRecord {
        let env = self.envelope;
        let whole = |name: &str| env.tag_f64(name).map(|v| v.round() as i32).unwrap_or(0);
        SiloRecord {
            device_id: env.device_id.clone(),
            message_created: env.created,
            record_created: self.now,
            name: self.tag("Name"),
            product: self.tag("Product"),
            current_value: env.tag_f64("CurrentValue").unwrap_or(0.0),
            max_weight: whole("MaxWeight"),
            min_weight: whole("LowWeight"),
            urgent_weight: whole("UrgentWeight"),
            reorder_weight: whole("ReorderWeight"),
            percent_full: whole("PercentFull"),
            usage_rate: self.tag("UsageRate"),
            normal_usage_rate: whole("NormalUsageRate"),
            minutes: whole("Minutes"),
            is_process: false,
            payload: self.payload_text(),
        }
    }

    fn vision(&self) -> Result<Vec<ProjectionRecord>> {
        let payload: VisionPayload = self.secondary("vision")?;
        let device_id = self.envelope.device_id.clone();
        let created = payload.created.unwrap_or(self.envelope.created);
        let positive = |v: Option<f64>| v.filter(|v| *v > 0.0);
        let mut records = Vec::new();

        for tag in payload.tags.iter().flatten() {
            let Some(tracker_id) = tag.tracker_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            let body_temp = tag
                .body_temp
                .as_deref()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);

            records.push(ProjectionRecord::PersonTracking(PersonTrackingRecord {
                device_id: device_id.clone(),
                message_id: payload.id.clone(),
                message_created: created,
                record_created: self.now,
                roi_id: payload.equipment_id.clone(),
                tracker_id: Some(tracker_id.to_string()),
                confidence: tag.confidence.clone(),
                object_id: tag.object_id.clone(),
                time: tag.time.clone(),
                x_axis: positive(payload.x).or(tag.x_axis).unwrap_or(0.0),
                y_axis: positive(payload.y).or(tag.y_axis).unwrap_or(0.0),
                helmet: tag.helmet.clone(),
                jacket: tag.jacket.clone(),
                jacket_color: tag.jacket_color.clone(),
                body_temp,
                check_in_time: tag.check_in_time.clone(),
            }));
        }

        if payload.roi_is("check-in-area") {
            return Ok(records);
        }

        if payload.roi_is("pathway") && payload.tags.is_empty() {
            records.push(ProjectionRecord::PersonTracking(PersonTrackingRecord {
                device_id: device_id.clone(),
                message_id: payload.id.clone(),
                message_created: created,
                record_created: self.now,
                roi_id: payload.equipment_id.clone(),
                x_axis: payload.x.unwrap_or(0.0),
                y_axis: payload.y.unwrap_or(0.0),
                ..PersonTrackingRecord::default()
            }));
        }

        records.push(ProjectionRecord::PersonCount(PersonCountRecord {
            device_id: device_id.clone(),
            message_id: payload.id.clone(),
            message_created: created,
            record_created: self.now,
            roi_id: payload.roi_id.clone(),
            total_person_count: payload.total_person_count.unwrap_or(0),
        }));

        for violation in &payload.social_distance_violations {
            records.push(ProjectionRecord::SocialDistance(SocialDistanceRecord {
                device_id: device_id.clone(),
                message_id: payload.id.clone(),
                message_created: created,
                record_created: self.now,
                roi_id: payload.roi_id.clone(),
                kind: payload.kind.clone(),
                location: violation.joined_location(),
                time: violation.time.clone(),
                person_count: violation.person_count.unwrap_or(0),
                object_id: violation.object_id.clone(),
            }));
        }

        Ok(records)
    }

    fn assembly(&self) -> Result<AssemblyLineRecord> {
        let payload: AssemblyPayload = self.secondary("assembly")?;
        let stations = &payload.station_details;
        let cycle_times = [1, 2, 3, 4, 5].map(|n| {
            stations
                .iter()
                .find_map(|s| s.station(n).0)
                .map(str::to_string)
        });
        let image_urls = [1, 2, 3, 4, 5].map(|n| {
            stations
                .iter()
                .find_map(|s| s.station(n).1)
                .map(str::to_string)
        });
        let details = payload.assembly_details.clone().unwrap_or_default();

        Ok(AssemblyLineRecord {
            device_id: payload
                .device_id
                .clone()
                .unwrap_or_else(|| self.envelope.device_id.clone()),
            message_created: payload.created.unwrap_or(self.envelope.created),
            record_created: self.now,
            kind: payload.kind.clone(),
            equipment_id: payload.equipment_id.clone(),
            assembly_cycle_time: details.assembly_cycle_time,
            assembly_image_url: details.assembly_image_url,
            station_cycle_times: cycle_times,
            station_image_urls: image_urls,
        })
    }

    fn vision_assembly(&self) -> Vec<ProjectionRecord> {
        let env = self.envelope;
        let header = self.machine_process();
        let header_id = header.id;
        let mut records = vec![ProjectionRecord::Process(header)];

        for step in &env.steps {
            records.push(ProjectionRecord::AssemblyStep(AssemblyStepRecord {
                id: Uuid::new_v4(),
                telemetry_id: header_id,
                device_id: env.device_id.clone(),
                camera_id: env.camera_id.clone(),
                message_created: env.created,
                record_created: self.now,
                name: step.name.clone(),
                start_time: step.start_time,
                end_time: step.end_time,
                is_completed: step.is_completed,
                metadata: step.metadata.clone(),
            }));
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use engine_core::{decode, ProcedureParam};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()
    }

    fn project(payload: serde_json::Value) -> Vec<ProjectionRecord> {
        let raw = serde_json::to_vec(&payload).unwrap();
        let envelope = decode(&raw).unwrap();
        Projector::new().project_at(&envelope, &raw, now()).unwrap()
    }

    fn envelope(kind: &str, tags: serde_json::Value) -> serde_json::Value {
        json!({
            "deviceId": "press-01",
            "created": "2024-05-02T08:59:30Z",
            "type": kind,
            "isLine": false,
            "tags": tags,
        })
    }

    #[test]
    fn test_plc_tag_miss_is_none() {
        let records = project(envelope(
            "Plc",
            json!([{ "name": "Pressure", "value": "12.345" }]),
        ));
        assert_eq!(records.len(), 1);
        let ProjectionRecord::Process(process) = &records[0] else {
            panic!("expected process record");
        };
        assert_eq!(process.pressure.as_deref(), Some("12.35"));
        assert_eq!(process.temperature, None);
        assert_eq!(process.cycle_time, 0.0);
        assert_eq!(process.production, 1.0);
        assert_eq!(process.record_created, now());
    }

    #[test]
    fn test_vibration_comes_from_rpm_tag() {
        let records = project(envelope(
            "SensorTelemetry",
            json!([
                { "name": "Vibration", "value": "4" },
                { "name": "RPM", "value": "1200" },
                { "name": "cycletime", "value": "-3" }
            ]),
        ));
        let ProjectionRecord::Process(process) = &records[0] else {
            panic!("expected process record");
        };
        assert_eq!(process.vibration.as_deref(), Some("1200"));
        assert_eq!(process.cycle_time, 0.0);
    }

    #[test]
    fn test_pulse_without_count_is_dropped() {
        let records = project(envelope("Pulse", json!([{ "name": "pulses", "value": "0" }])));
        assert!(records.is_empty());
    }

    #[test]
    fn test_device_pulse_call() {
        let records = project(envelope(
            "Pulse",
            json!([{ "name": "pulses", "value": "3" }, { "name": "duration", "value": "60" }]),
        ));
        assert_eq!(records.len(), 1);
        let ProjectionRecord::Pulse(pulse) = &records[0] else {
            panic!("expected pulse record");
        };
        assert_eq!(pulse.target, PulseTarget::Device);
        assert!(pulse.payload.contains(CYCLE_TIME_PLACEHOLDER));

        let call = pulse.procedure_call();
        assert_eq!(call.name, engine_core::DEVICE_PULSE_PROCEDURE);
        assert_eq!(call.params[3], ProcedureParam::Int(3));
        assert_eq!(call.params[4], ProcedureParam::Int(60));
    }

    #[test]
    fn test_line_pulse_targets_line_procedure() {
        let mut payload = envelope("Pulse", json!([{ "name": "pulses", "value": "2" }]));
        payload["isLine"] = json!(true);
        let records = project(payload);
        let ProjectionRecord::Pulse(pulse) = &records[0] else {
            panic!("expected pulse record");
        };
        assert_eq!(pulse.target, PulseTarget::Line);
    }

    #[test]
    fn test_extrusion_flow_reads_production() {
        let records = project(envelope(
            "TXKGEMESP",
            json!([
                { "name": "Production", "value": "42.5" },
                { "name": "Flow rate", "value": "abc" }
            ]),
        ));
        let ProjectionRecord::Process(process) = &records[0] else {
            panic!("expected process record");
        };
        assert_eq!(process.production, 42.5);
        assert_eq!(process.flow_rate, 0.0);
        assert!(!process.is_line);
    }

    #[test]
    fn test_vision_check_in_area_only_tracks() {
        let records = project(json!({
            "id": "msg-1",
            "deviceId": "cam-01",
            "created": "2024-05-02T08:59:30Z",
            "type": "VisionTelemetry",
            "roiId": "Check-In-Area",
            "equipmentId": "gate",
            "tags": [
                { "trackerId": "t1", "bodyTemp": "36.6" },
                { "trackerId": "t2", "bodyTemp": "n/a" }
            ],
            "socialDistanceViolations": [{ "location": [1, 2], "personCount": 2 }]
        }));
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.name() == "person_tracking"));
        let ProjectionRecord::PersonTracking(second) = &records[1] else {
            panic!("expected tracking record");
        };
        assert_eq!(second.body_temp, 0.0);
        assert_eq!(second.roi_id.as_deref(), Some("gate"));
    }

    #[test]
    fn test_vision_empty_pathway() {
        let records = project(json!({
            "id": "msg-2",
            "deviceId": "cam-01",
            "created": "2024-05-02T08:59:30Z",
            "type": "VisionTelemetry",
            "roiId": "pathway",
            "x": 0.4,
            "y": 0.7,
            "totalPersonCount": 0,
            "tags": []
        }));
        assert_eq!(records.len(), 2);
        let ProjectionRecord::PersonTracking(position) = &records[0] else {
            panic!("expected position record");
        };
        assert_eq!(position.tracker_id, None);
        assert_eq!(position.x_axis, 0.4);
        assert_eq!(records[1].name(), "person_count");
    }

    #[test]
    fn test_vision_pathway_with_blank_tracker_counts_only() {
        let records = project(json!({
            "id": "msg-3",
            "deviceId": "cam-01",
            "created": "2024-05-02T08:59:30Z",
            "type": "VisionTelemetry",
            "roiId": "pathway",
            "x": 0.4,
            "y": 0.7,
            "totalPersonCount": 1,
            "tags": [{"trackerId": ""}]
        }));
        let names: Vec<&str> = records.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["person_count"]);
    }

    #[test]
    fn test_vision_violations_joined() {
        let records = project(json!({
            "deviceId": "cam-01",
            "created": "2024-05-02T08:59:30Z",
            "type": "VisionTelemetry",
            "roiId": "hall",
            "socialDistanceViolations": [
                { "location": [10, 20], "personCount": 3 },
                { "location": ["a", "b"] }
            ]
        }));
        assert_eq!(records.len(), 3);
        let ProjectionRecord::SocialDistance(first) = &records[1] else {
            panic!("expected violation record");
        };
        assert_eq!(first.location, "10,20");
        assert_eq!(first.person_count, 3);
    }

    #[test]
    fn test_assembly_station_first_non_null() {
        let records = project(json!({
            "deviceId": "asm-01",
            "created": "2024-05-02T08:59:30Z",
            "type": "Assembly",
            "assemblyDetails": { "assemblyCycleTime": "55" },
            "stationDetails": [
                { "station1CycleTime": "10" },
                { "station1CycleTime": "11", "station2CycleTime": "20", "station2ImageUrl": "s2.png" }
            ]
        }));
        let ProjectionRecord::AssemblyLine(line) = &records[0] else {
            panic!("expected assembly record");
        };
        assert_eq!(line.assembly_cycle_time.as_deref(), Some("55"));
        assert_eq!(line.station_cycle_times[0].as_deref(), Some("10"));
        assert_eq!(line.station_cycle_times[1].as_deref(), Some("20"));
        assert_eq!(line.station_image_urls[1].as_deref(), Some("s2.png"));
        assert_eq!(line.station_cycle_times[4], None);
    }

    #[test]
    fn test_vision_assembly_links_steps() {
        let records = project(json!({
            "deviceId": "asm-02",
            "created": "2024-05-02T08:59:30Z",
            "type": "VisionAssembly",
            "cameraId": "cam-7",
            "steps": [
                { "name": "fit", "isCompleted": true, "metaData": [{ "actualCount": 2, "expectedCount": 2 }] },
                { "name": "screw", "isCompleted": false }
            ]
        }));
        assert_eq!(records.len(), 3);
        let ProjectionRecord::Process(header) = &records[0] else {
            panic!("expected header");
        };
        for record in &records[1..] {
            let ProjectionRecord::AssemblyStep(step) = record else {
                panic!("expected step");
            };
            assert_eq!(step.telemetry_id, header.id);
            assert_eq!(step.camera_id.as_deref(), Some("cam-7"));
        }
    }

    #[test]
    fn test_temperature_and_unknown_produce_nothing() {
        assert!(project(envelope("Temperature", json!([]))).is_empty());
        assert!(project(envelope("Mystery", json!([]))).is_empty());
    }

    #[test]
    fn test_energy_merges_tags() {
        let mut payload = envelope(
            "EnergyOnMeter",
            json!([{ "name": "Phase1Current", "value": "3.456" }]),
        );
        payload["energyDuration"] = json!(15);
        let records = project(payload);
        let ProjectionRecord::Energy(energy) = &records[0] else {
            panic!("expected energy record");
        };
        assert_eq!(energy.phase1_current.as_deref(), Some("3.46"));
        assert_eq!(energy.total_active_energy, None);
        assert_eq!(energy.energy_duration, Some(15.0));
        assert_eq!(energy.kind, "EnergyOnMeter");
    }

    #[test]
    fn test_silo_whole_numbers() {
        let records = project(envelope(
            "SilosTelemetry",
            json!([
                { "name": "MaxWeight", "value": "5000" },
                { "name": "PercentFull", "value": "63.6" },
                { "name": "CurrentValue", "value": "3180.25" }
            ]),
        ));
        let ProjectionRecord::Silo(silo) = &records[0] else {
            panic!("expected silo record");
        };
        assert_eq!(silo.max_weight, 5000);
        assert_eq!(silo.percent_full, 64);
        assert_eq!(silo.current_value, 3180.25);
        assert_eq!(silo.minutes, 0);
    }
}
