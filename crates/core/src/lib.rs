//! Core types, schema kinds, and storage contracts for the telemetry engine.

pub mod aggregation;
pub mod checkpoint;
pub mod de;
pub mod envelope;
pub mod error;
pub mod payloads;
pub mod records;
pub mod schema;
pub mod source;
pub mod store;

pub use aggregation::*;
pub use checkpoint::*;
pub use envelope::*;
pub use error::{Error, ErrorClass, Result};
pub use records::*;
pub use schema::SchemaKind;
pub use source::*;
pub use store::*;
