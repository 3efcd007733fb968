//! Telemetry schema kinds.
//!
//! The `type` field of every envelope selects which projection applies.
//! Unrecognized names are kept as [`SchemaKind::Unknown`] so they can be
//! logged and dropped rather than failing the decode.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Schema discriminator of a telemetry envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Pulse,
    Plc,
    Valves,
    /// `SensorTelemetry`
    Sensor,
    /// `TXPLEMDAI` device profile
    TxPlEmDai,
    /// `TXKGEMDAI` device profile
    TxKgEmDai,
    Packing,
    RejectionPulse,
    /// `TXKGEMISP` extrusion job profile
    TxKgEmIsp,
    /// `TXKGEMESP` extrusion flow profile
    TxKgEmEsp,
    /// `TXLNEMDAI` line meter profile
    TxLnEmDai,
    Health,
    Energy,
    EnergyOnDevice,
    EnergyOnMeter,
    /// `RawTelemetry`
    RawDigital,
    /// `SilosTelemetry`
    Silos,
    /// `VisionTelemetry`
    Vision,
    Temperature,
    Assembly,
    VisionAssembly,
    Unknown(String),
}

impl SchemaKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pulse => "Pulse",
            Self::Plc => "Plc",
            Self::Valves => "Valves",
            Self::Sensor => "SensorTelemetry",
            Self::TxPlEmDai => "TXPLEMDAI",
            Self::TxKgEmDai => "TXKGEMDAI",
            Self::Packing => "Packing",
            Self::RejectionPulse => "RejectionPulse",
            Self::TxKgEmIsp => "TXKGEMISP",
            Self::TxKgEmEsp => "TXKGEMESP",
            Self::TxLnEmDai => "TXLNEMDAI",
            Self::Health => "Health",
            Self::Energy => "Energy",
            Self::EnergyOnDevice => "EnergyOnDevice",
            Self::EnergyOnMeter => "EnergyOnMeter",
            Self::RawDigital => "RawTelemetry",
            Self::Silos => "SilosTelemetry",
            Self::Vision => "VisionTelemetry",
            Self::Temperature => "Temperature",
            Self::Assembly => "Assembly",
            Self::VisionAssembly => "VisionAssembly",
            Self::Unknown(name) => name,
        }
    }

    /// Parses a wire name. Never fails: unknown names map to `Unknown`.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "Pulse" => Self::Pulse,
            "Plc" => Self::Plc,
            "Valves" => Self::Valves,
            "SensorTelemetry" => Self::Sensor,
            "TXPLEMDAI" => Self::TxPlEmDai,
            "TXKGEMDAI" => Self::TxKgEmDai,
            "Packing" => Self::Packing,
            "RejectionPulse" => Self::RejectionPulse,
            "TXKGEMISP" => Self::TxKgEmIsp,
            "TXKGEMESP" => Self::TxKgEmEsp,
            "TXLNEMDAI" => Self::TxLnEmDai,
            "Health" => Self::Health,
            "Energy" => Self::Energy,
            "EnergyOnDevice" => Self::EnergyOnDevice,
            "EnergyOnMeter" => Self::EnergyOnMeter,
            "RawTelemetry" => Self::RawDigital,
            "SilosTelemetry" => Self::Silos,
            "VisionTelemetry" => Self::Vision,
            "Temperature" => Self::Temperature,
            "Assembly" => Self::Assembly,
            "VisionAssembly" => Self::VisionAssembly,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Kinds projected into the generic process record.
    pub fn is_process(&self) -> bool {
        matches!(
            self,
            Self::Plc
                | Self::Valves
                | Self::Sensor
                | Self::TxPlEmDai
                | Self::TxKgEmDai
                | Self::TxKgEmIsp
                | Self::TxKgEmEsp
                | Self::TxLnEmDai
        )
    }

    pub fn is_energy(&self) -> bool {
        matches!(
            self,
            Self::Energy | Self::EnergyOnDevice | Self::EnergyOnMeter
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl Default for SchemaKind {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SchemaKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchemaKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.map(|n| Self::from_wire(&n)).unwrap_or_default())
    }
}
