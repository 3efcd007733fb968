//! Partition checkpoint store.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CheckpointErrorCode, Error, Result};

/// Identity of a checkpointed partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub stream: String,
    pub consumer_group: String,
    pub partition_id: i32,
}

impl PartitionKey {
    pub fn new(stream: impl Into<String>, consumer_group: impl Into<String>, partition_id: i32) -> Self {
        Self {
            stream: stream.into(),
            consumer_group: consumer_group.into(),
            partition_id,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.stream, self.consumer_group, self.partition_id)
    }
}

/// Last acknowledged position of a partition.
///
/// `offset` is the offset of the last event of the flushed batch; reading
/// resumes at `offset + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub offset: i64,
    pub sequence_number: i64,
}

impl Checkpoint {
    pub fn next_offset(&self) -> i64 {
        self.offset + 1
    }
}

/// Durable mapping from partition to last acknowledged position.
///
/// Saves for one partition are serialized by the caller. Implementations do
/// not retry.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, key: &PartitionKey) -> Result<Option<Checkpoint>>;

    /// Persists the checkpoint. Durable once this returns `Ok`.
    async fn save(&self, key: &PartitionKey, checkpoint: Checkpoint) -> Result<()>;
}

/// In-process checkpoint store for tests and single-node development.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: RwLock<HashMap<PartitionKey, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current checkpoint without going through the async trait.
    pub fn get(&self, key: &PartitionKey) -> Option<Checkpoint> {
        self.entries.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, key: &PartitionKey) -> Result<Option<Checkpoint>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &PartitionKey, checkpoint: Checkpoint) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(current) = entries.get(key) {
            if checkpoint.offset < current.offset {
                return Err(Error::checkpoint(
                    CheckpointErrorCode::SaveFailed,
                    format!(
                        "checkpoint for {} would move backwards: {} -> {}",
                        key, current.offset, checkpoint.offset
                    ),
                ));
            }
        }
        entries.insert(key.clone(), checkpoint);
        Ok(())
    }
}
