//! Unified error types for the telemetry engine.
//!
//! Error codes by class:
//! - DECODE_001-002: Envelope decoding errors
//! - PROJ_001: Projection errors
//! - STORE_001-002: Storage errors
//! - CKPT_001-002: Checkpoint errors
//! - TRANSPORT_001: Stream / broker transport errors
//! - AGG_001: Aggregation errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad error class, used to decide how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Per-event, skipped. The event still counts toward the checkpoint.
    Decode,
    /// Per-event, skipped.
    Projection,
    /// Per-batch. Blocks the checkpoint and triggers redelivery.
    Storage,
    /// Bookkeeping. Reported, processing continues.
    Checkpoint,
    /// Connection level. Retried on a fixed interval.
    Transport,
    /// Scheduler cycle. Logged, loop continues.
    Aggregation,
    Configuration,
    Internal,
}

/// Decode error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorCode {
    /// DECODE_001: Payload is empty
    EmptyPayload,
    /// DECODE_002: Payload is not a valid envelope
    InvalidEnvelope,
}

impl DecodeErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPayload => "DECODE_001",
            Self::InvalidEnvelope => "DECODE_002",
        }
    }
}

/// Storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: Failed to insert records
    InsertFailed,
    /// STORE_002: Failed to execute a named procedure
    ProcedureFailed,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsertFailed => "STORE_001",
            Self::ProcedureFailed => "STORE_002",
        }
    }
}

/// Checkpoint error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointErrorCode {
    /// CKPT_001: Failed to load a checkpoint
    LoadFailed,
    /// CKPT_002: Failed to save a checkpoint
    SaveFailed,
}

impl CheckpointErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LoadFailed => "CKPT_001",
            Self::SaveFailed => "CKPT_002",
        }
    }
}

/// Unified error type for the telemetry engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope decode error with code.
    #[error("[{code}] {message}")]
    Decode { code: &'static str, message: String },

    /// Storage error with code.
    #[error("[{code}] {message}")]
    Storage { code: &'static str, message: String },

    /// Checkpoint error with code.
    #[error("[{code}] {message}")]
    Checkpoint { code: &'static str, message: String },

    #[error("[PROJ_001] projection error: {0}")]
    Projection(String),

    #[error("[TRANSPORT_001] transport error: {0}")]
    Transport(String),

    #[error("[AGG_001] aggregation error: {0}")]
    Aggregation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(code: DecodeErrorCode, msg: impl Into<String>) -> Self {
        Self::Decode {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(code: StoreErrorCode, msg: impl Into<String>) -> Self {
        Self::Storage {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a checkpoint error.
    pub fn checkpoint(code: CheckpointErrorCode, msg: impl Into<String>) -> Self {
        Self::Checkpoint {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn projection(msg: impl Into<String>) -> Self {
        Self::Projection(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn aggregation(msg: impl Into<String>) -> Self {
        Self::Aggregation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the handling class for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Decode { .. } => ErrorClass::Decode,
            Self::Serialization(_) => ErrorClass::Decode,
            Self::Projection(_) => ErrorClass::Projection,
            Self::Storage { .. } => ErrorClass::Storage,
            Self::Checkpoint { .. } => ErrorClass::Checkpoint,
            Self::Transport(_) => ErrorClass::Transport,
            Self::Aggregation(_) => ErrorClass::Aggregation,
            Self::Configuration(_) => ErrorClass::Configuration,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Decode { code, .. } => Some(code),
            Self::Storage { code, .. } => Some(code),
            Self::Checkpoint { code, .. } => Some(code),
            Self::Projection(_) => Some("PROJ_001"),
            Self::Transport(_) => Some("TRANSPORT_001"),
            Self::Aggregation(_) => Some("AGG_001"),
            _ => None,
        }
    }

    /// Whether this error only affects a single event.
    pub fn is_per_event(&self) -> bool {
        matches!(self.class(), ErrorClass::Decode | ErrorClass::Projection)
    }
}
