//! ClickHouse storage for equipment telemetry.
//!
//! Provides the telemetry store, the checkpoint store and the downtime
//! aggregation passes over one shared client.

pub mod aggregation;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod procedures;
pub mod schema;
pub mod store;

pub use aggregation::{AggregationSettings, ClickHouseAggregations};
pub use checkpoint::ClickHouseCheckpointStore;
pub use client::*;
pub use config::*;
pub use schema::init_schema;
pub use store::ClickHouseTelemetryStore;
