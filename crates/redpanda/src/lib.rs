//! Redpanda partition source for the telemetry engine.

pub mod assignment;
pub mod config;
pub mod health;
pub mod source;

pub use assignment::*;
pub use config::*;
pub use source::*;
