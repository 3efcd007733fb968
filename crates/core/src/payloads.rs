//! Secondary payload schemas.
//!
//! Some kinds carry fields outside the common envelope. Those payloads are
//! decoded a second time from the same raw bytes into the shapes below.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::de;

/// Device health report (`Health`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPayload {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "de::optional_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub device_information: Option<DeviceInformation>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub node_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub sensor_type: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub plc_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInformation {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub wi_fi_signal_strength: Option<String>,
}

/// Energy meter header (`Energy`, `EnergyOnDevice`, `EnergyOnMeter`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPayload {
    #[serde(default, deserialize_with = "de::optional_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_f64")]
    pub energy_duration: Option<f64>,
}

/// Camera frame analysis (`VisionTelemetry`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionPayload {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de::optional_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub equipment_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub roi_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "de::flexible_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "de::flexible_i64")]
    pub total_person_count: Option<i64>,
    #[serde(rename = "type", default, deserialize_with = "de::flexible_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tags: Vec<Option<VisionTag>>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub social_distance_violations: Vec<SocialDistanceViolation>,
}

impl VisionPayload {
    /// Region of interest, compared case-insensitively.
    pub fn roi_is(&self, name: &str) -> bool {
        self.roi_id
            .as_deref()
            .is_some_and(|roi| roi.eq_ignore_ascii_case(name))
    }
}

/// One tracked person within a vision frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionTag {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub tracker_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub body_temp: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub confidence: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub object_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_f64")]
    pub x_axis: Option<f64>,
    #[serde(default, deserialize_with = "de::flexible_f64")]
    pub y_axis: Option<f64>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub helmet: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub jacket: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub jacket_color: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub check_in_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialDistanceViolation {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub location: Vec<Value>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_i64")]
    pub person_count: Option<i64>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub object_id: Option<String>,
}

impl SocialDistanceViolation {
    /// Location coordinates joined with `,`.
    pub fn joined_location(&self) -> String {
        self.location
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Assembly line cycle report (`Assembly`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyPayload {
    #[serde(default, deserialize_with = "de::optional_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(rename = "type", default, deserialize_with = "de::flexible_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub equipment_id: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub assembly_details: Option<AssemblyDetails>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub station_details: Vec<StationDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyDetails {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub assembly_cycle_time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub assembly_image_url: Option<String>,
}

/// Partial station report. Each entry usually fills one station only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationDetails {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station1_cycle_time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station1_image_url: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station2_cycle_time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station2_image_url: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station3_cycle_time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station3_image_url: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station4_cycle_time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station4_image_url: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station5_cycle_time: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub station5_image_url: Option<String>,
}

impl StationDetails {
    /// `(cycle_time, image_url)` for station `n` (1-based).
    pub fn station(&self, n: usize) -> (Option<&str>, Option<&str>) {
        let (cycle, image) = match n {
            1 => (&self.station1_cycle_time, &self.station1_image_url),
            2 => (&self.station2_cycle_time, &self.station2_image_url),
            3 => (&self.station3_cycle_time, &self.station3_image_url),
            4 => (&self.station4_cycle_time, &self.station4_image_url),
            5 => (&self.station5_cycle_time, &self.station5_image_url),
            _ => return (None, None),
        };
        (cycle.as_deref(), image.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_payload() {
        let json = r#"{
            "deviceId": "gw-3",
            "created": "2024-05-02T08:30:00Z",
            "status": "Online",
            "deviceInformation": {"wiFiSignalStrength": -61},
            "nodeId": 4
        }"#;
        let payload: HealthPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.device_id.as_deref(), Some("gw-3"));
        assert_eq!(payload.node_id.as_deref(), Some("4"));
        assert_eq!(
            payload
                .device_information
                .and_then(|d| d.wi_fi_signal_strength)
                .as_deref(),
            Some("-61")
        );
    }

    #[test]
    fn test_vision_payload_roi() {
        let json = r#"{
            "roiId": "Check-In-Area",
            "tags": [null, {"trackerId": "t1", "bodyTemp": "36.6"}],
            "socialDistanceViolations": [{"location": [1.5, "2"], "personCount": 2}]
        }"#;
        let payload: VisionPayload = serde_json::from_str(json).unwrap();
        assert!(payload.roi_is("check-in-area"));
        assert_eq!(payload.tags.len(), 2);
        assert_eq!(payload.social_distance_violations[0].joined_location(), "1.5,2");
    }

    #[test]
    fn test_station_lookup() {
        let details = StationDetails {
            station3_cycle_time: Some("41".into()),
            ..StationDetails::default()
        };
        assert_eq!(details.station(3), (Some("41"), None));
        assert_eq!(details.station(9), (None, None));
    }
}
