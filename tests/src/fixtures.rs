//! Telemetry payload generators.

use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

fn created(minute: u32) -> String {
    let base = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).single().unwrap_or_default();
    (base + Duration::minutes(i64::from(minute)))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Envelope of `kind` with the given tags.
pub fn envelope(device_id: &str, kind: &str, tags: Value) -> Value {
    json!({
        "deviceId": device_id,
        "created": created(0),
        "type": kind,
        "isLine": false,
        "tags": tags
    })
}

/// PLC reading with a pressure tag.
pub fn plc(device_id: &str, pressure: &str) -> Value {
    envelope(
        device_id,
        "Plc",
        json!([{ "name": "Pressure", "value": pressure }, { "name": "cycletime", "value": "12" }]),
    )
}

/// Packing counters.
pub fn packing(device_id: &str) -> Value {
    envelope(
        device_id,
        "Packing",
        json!([{ "name": "DI1", "value": "1" }, { "name": "DI2", "value": "0" }]),
    )
}

pub fn pulse(device_id: &str, pulses: u32, is_line: bool) -> Value {
    let mut value = envelope(
        device_id,
        "Pulse",
        json!([{ "name": "pulses", "value": pulses.to_string() }, { "name": "duration", "value": "60" }]),
    );
    value["isLine"] = json!(is_line);
    value
}

/// Vision frame on the pathway with no tracked people.
pub fn empty_pathway(device_id: &str) -> Value {
    json!({
        "id": "frame-1",
        "deviceId": device_id,
        "created": created(1),
        "type": "VisionTelemetry",
        "roiId": "pathway",
        "equipmentId": "pathway",
        "x": 4,
        "y": 7,
        "totalPersonCount": 2,
        "tags": []
    })
}

pub fn bytes(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Payload that fails to decode.
pub fn malformed() -> Vec<u8> {
    b"{\"deviceId\": \"broken\", \"created\":".to_vec()
}
