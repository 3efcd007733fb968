//! Durable partition checkpoints.
//!
//! Each save appends a row; `ReplacingMergeTree(updated_at)` collapses rows
//! per partition and reads use `FINAL` plus newest-first ordering.

use crate::client::ClickHouseClient;
use crate::schema::tables;
use async_trait::async_trait;
use chrono::Utc;
use clickhouse::Row;
use engine_core::error::CheckpointErrorCode;
use engine_core::{Checkpoint, CheckpointStore, Error, PartitionKey, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Row, Serialize)]
struct CheckpointRow {
    stream: String,
    consumer_group: String,
    partition_id: i32,
    committed_offset: i64,
    sequence_number: i64,
    updated_at: i64,
}

#[derive(Debug, Clone, Row, Deserialize)]
struct StoredCheckpoint {
    committed_offset: i64,
    sequence_number: i64,
}

const LOAD_SQL: &str = "SELECT committed_offset, sequence_number \
    FROM partition_checkpoints FINAL \
    WHERE stream = ? AND consumer_group = ? AND partition_id = ? \
    ORDER BY updated_at DESC LIMIT 1";

#[derive(Clone)]
pub struct ClickHouseCheckpointStore {
    client: ClickHouseClient,
}

impl ClickHouseCheckpointStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CheckpointStore for ClickHouseCheckpointStore {
    async fn load(&self, key: &PartitionKey) -> Result<Option<Checkpoint>> {
        let stored = self
            .client
            .inner()
            .query(LOAD_SQL)
            .bind(key.stream.as_str())
            .bind(key.consumer_group.as_str())
            .bind(key.partition_id)
            .fetch_optional::<StoredCheckpoint>()
            .await
            .map_err(|e| {
                Error::checkpoint(
                    CheckpointErrorCode::LoadFailed,
                    format!("failed to load checkpoint for {}: {}", key, e),
                )
            })?;

        Ok(stored.map(|row| Checkpoint {
            offset: row.committed_offset,
            sequence_number: row.sequence_number,
        }))
    }

    async fn save(&self, key: &PartitionKey, checkpoint: Checkpoint) -> Result<()> {
        let save_err = |e: clickhouse::error::Error| {
            Error::checkpoint(
                CheckpointErrorCode::SaveFailed,
                format!("failed to save checkpoint for {}: {}", key, e),
            )
        };

        let row = CheckpointRow {
            stream: key.stream.clone(),
            consumer_group: key.consumer_group.clone(),
            partition_id: key.partition_id,
            committed_offset: checkpoint.offset,
            sequence_number: checkpoint.sequence_number,
            updated_at: Utc::now().timestamp_millis(),
        };

        let mut insert = self
            .client
            .inner()
            .insert(tables::CHECKPOINTS)
            .map_err(save_err)?;
        insert.write(&row).await.map_err(save_err)?;
        insert.end().await.map_err(save_err)?;

        debug!(partition = %key, offset = checkpoint.offset, "Checkpoint saved");
        Ok(())
    }
}
