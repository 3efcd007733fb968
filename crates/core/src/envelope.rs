//! Raw and decoded telemetry envelopes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::de;
use crate::error::{DecodeErrorCode, Error, Result};
use crate::schema::SchemaKind;

/// Opaque event as delivered by the stream transport.
#[derive(Debug, Clone)]
pub struct RawEnvelope {
    pub partition_id: i32,
    pub offset: i64,
    pub sequence_number: i64,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub payload: Bytes,
}

impl RawEnvelope {
    pub fn new(partition_id: i32, offset: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            partition_id,
            offset,
            sequence_number: offset,
            enqueued_at: None,
            payload: payload.into(),
        }
    }
}

/// One named reading carried by an envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub label: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "de::flexible_string")]
    pub tag_type: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "normalized_value")]
    pub value: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl AsRef<str>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(normalize_tag_value(value.as_ref())),
            ..Self::default()
        }
    }
}

/// Step metadata reported by vision assembly cameras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadata {
    #[serde(default, deserialize_with = "de::flexible_i64")]
    pub actual_count: Option<i64>,
    #[serde(default, deserialize_with = "de::flexible_i64")]
    pub expected_count: Option<i64>,
}

/// One step of a vision-tracked assembly process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default, deserialize_with = "de::flexible_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::optional_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::optional_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::flexible_bool")]
    pub is_completed: bool,
    #[serde(rename = "metaData", default, deserialize_with = "de::null_as_default")]
    pub metadata: Vec<StepMetadata>,
}

/// Decoded telemetry envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEnvelope {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub device_id: String,
    #[serde(deserialize_with = "de::timestamp")]
    pub created: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: SchemaKind,
    #[serde(default, deserialize_with = "de::flexible_bool")]
    pub is_line: bool,
    #[serde(default, deserialize_with = "de::compact_vec")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
}

impl TelemetryEnvelope {
    /// Value of the first tag named `name`.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name.as_deref() == Some(name))
            .and_then(|t| t.value.as_deref())
    }

    pub fn tag_string(&self, name: &str) -> Option<String> {
        self.tag(name).map(str::to_string)
    }

    pub fn tag_f64(&self, name: &str) -> Option<f64> {
        self.tag(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Numeric tag clamped to zero when absent, invalid or non-positive.
    pub fn tag_positive_f64(&self, name: &str) -> f64 {
        self.tag_f64(name).filter(|v| *v > 0.0).unwrap_or(0.0)
    }

    pub fn tag_i64(&self, name: &str) -> Option<i64> {
        self.tag(name).and_then(de::parse_integer)
    }

    pub fn tag_bool(&self, name: &str) -> Option<bool> {
        self.tag(name).and_then(de::parse_bool)
    }

    /// Cycle time from the `cycletime` tag, zero when unusable.
    pub fn cycle_time(&self) -> f64 {
        self.tag_positive_f64("cycletime")
    }
}

/// Decodes a raw payload into an envelope.
pub fn decode(payload: &[u8]) -> Result<TelemetryEnvelope> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::decode(DecodeErrorCode::EmptyPayload, "payload is empty"));
    }
    serde_json::from_slice(payload)
        .map_err(|e| Error::decode(DecodeErrorCode::InvalidEnvelope, e.to_string()))
}

/// Rounds numeric tag values to two decimals, half away from zero.
///
/// Non-numeric values are returned unchanged.
pub fn normalize_tag_value(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => round_two_places(v),
        _ => raw.to_string(),
    }
}

// Rounds on the shortest decimal form so `2.675` becomes `2.68`, not `2.67`.
fn round_two_places(value: f64) -> String {
    let text = value.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let kept = &frac_part[..frac_part.len().min(2)];
    let round_up = frac_part.as_bytes().get(2).is_some_and(|d| *d >= b'5');

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(kept.bytes())
        .map(|b| b - b'0')
        .collect();
    if round_up {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - kept.len();
    let int_digits: String = digits[..split].iter().map(|d| char::from(b'0' + d)).collect();
    let frac_digits: String = digits[split..].iter().map(|d| char::from(b'0' + d)).collect();
    let frac_digits = frac_digits.trim_end_matches('0');

    let is_zero = digits.iter().all(|d| *d == 0);
    let mut out = String::new();
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&int_digits);
    if !frac_digits.is_empty() {
        out.push('.');
        out.push_str(frac_digits);
    }
    out
}

fn normalized_value<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de::flexible_string(deserializer)?.map(|v| normalize_tag_value(&v)))
}
