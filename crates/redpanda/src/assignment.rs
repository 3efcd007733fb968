//! Static partition assignment.
//!
//! A single process owns every partition of the topic: they are either
//! listed in configuration or discovered from broker metadata, then
//! assigned once at start-up.

use crate::config::RedpandaConfig;
use crate::source::RedpandaSource;
use engine_core::{PartitionAssignment, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Resolves the partition set for this process.
pub async fn resolve_partitions(
    config: &RedpandaConfig,
    source: &RedpandaSource,
) -> Result<Vec<i32>> {
    let mut partitions = match &config.partitions {
        Some(list) if !list.is_empty() => list.clone(),
        _ => source.discover_partitions().await?,
    };
    partitions.sort_unstable();
    partitions.dedup();
    Ok(partitions)
}

/// Spawns a task that assigns every partition once resolution succeeds.
///
/// Resolution is retried after the restart backoff until it succeeds or
/// `cancel` fires. The returned channel stays open until cancellation.
pub fn spawn_static_assignment(
    source: Arc<RedpandaSource>,
    cancel: CancellationToken,
) -> mpsc::Receiver<PartitionAssignment> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let config = source.config().clone();
        let partitions = loop {
            match resolve_partitions(&config, &source).await {
                Ok(partitions) => break partitions,
                Err(e) => {
                    error!(topic = %config.topic, "Partition discovery failed: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(config.restart_backoff()) => {}
                    }
                }
            }
        };

        info!(topic = %config.topic, partitions = ?partitions, "Assigning partitions");
        for partition in partitions {
            if tx.send(PartitionAssignment::Assigned(partition)).await.is_err() {
                return;
            }
        }

        cancel.cancelled().await;
    });

    rx
}
