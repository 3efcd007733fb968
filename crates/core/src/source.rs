//! Partitioned stream transport interface.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::RawEnvelope;
use crate::error::Result;

/// Where a partition without a checkpoint starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    #[default]
    Earliest,
    Latest,
}

/// Partition ownership change delivered to the consumer manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionAssignment {
    Assigned(i32),
    Revoked(i32),
}

/// Pull-based reader over a partitioned log.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    /// Stream identity used as the checkpoint namespace.
    fn stream_id(&self) -> &str;

    /// Resolves a start position to a concrete offset.
    async fn resolve_start(&self, partition: i32, position: StartPosition) -> Result<i64>;

    /// Reads up to `max_events` events at or after `from_offset`.
    ///
    /// Waits at most `max_wait` for the first event; an empty result means
    /// nothing arrived in time.
    async fn fetch(
        &self,
        partition: i32,
        from_offset: i64,
        max_events: usize,
        max_wait: Duration,
    ) -> Result<Vec<RawEnvelope>>;
}
