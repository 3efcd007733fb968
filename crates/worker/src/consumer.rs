//! Partition consumer: stream to store pipeline.
//!
//! Each owned partition runs its own task:
//! 1. Load the checkpoint (or resolve the start position)
//! 2. Fetch a batch
//! 3. Decode, project and stage every event, skipping bad ones
//! 4. Flush the write set
//! 5. Save the checkpoint at the last event of the batch (at-least-once)
//!
//! A failed flush rewinds to the batch start and retries after a backoff.
//! Fetch errors end the task; [`PartitionManager`] restarts it from the last
//! saved checkpoint.

use crate::dispatcher::{Dispatcher, WriteSet};
use crate::notifications::{ErrorContext, Notifier};
use engine_core::{
    Checkpoint, CheckpointStore, PartitionAssignment, PartitionKey, PartitionSource, RawEnvelope,
    Result, StartPosition,
};
use redpanda::RedpandaConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-partition consumer settings.
#[derive(Debug, Clone)]
pub struct PartitionSettings {
    pub consumer_group: String,
    pub batch_size: usize,
    pub max_wait: Duration,
    pub start_position: StartPosition,
    /// Delay between flush retries and before a partition restart
    pub retry_backoff: Duration,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self::from_config(&RedpandaConfig::default())
    }
}

impl PartitionSettings {
    pub fn from_config(config: &RedpandaConfig) -> Self {
        Self {
            consumer_group: config.consumer_group.clone(),
            batch_size: config.batch_size,
            max_wait: config.max_wait(),
            start_position: config.start_position,
            retry_backoff: config.restart_backoff(),
        }
    }
}

/// Collaborators shared by every partition task.
#[derive(Clone)]
pub struct PipelineContext {
    pub source: Arc<dyn PartitionSource>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: PartitionSettings,
}

/// Outcome of one processed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub events: usize,
    pub skipped: usize,
    /// Offset to read next
    pub next_offset: i64,
    pub checkpoint_saved: bool,
}

/// Consumer of a single partition.
pub struct PartitionConsumer {
    partition: i32,
    key: PartitionKey,
    ctx: PipelineContext,
}

impl PartitionConsumer {
    pub fn new(partition: i32, ctx: PipelineContext) -> Self {
        let key = PartitionKey::new(
            ctx.source.stream_id(),
            ctx.settings.consumer_group.clone(),
            partition,
        );
        Self {
            partition,
            key,
            ctx,
        }
    }

    /// Runs until cancelled or a fetch fails.
    ///
    /// Cancellation is observed between batches, so an in-flight flush and
    /// checkpoint save always complete.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Some(mut position) = self.initialize(&cancel).await else {
            return Ok(());
        };
        info!(partition = self.partition, offset = position, "Partition active");

        let result = loop {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                fetched = self.ctx.source.fetch(
                    self.partition,
                    position,
                    self.ctx.settings.batch_size,
                    self.ctx.settings.max_wait,
                ) => fetched,
            };

            let events = match fetched {
                Ok(events) => events,
                Err(e) => break Err(e),
            };
            if events.is_empty() {
                continue;
            }

            match self.process_batch(&events).await {
                Ok(outcome) => position = outcome.next_offset,
                Err(e) => {
                    // Position stays at the batch start so the batch is read again.
                    let first = &events[0];
                    self.ctx
                        .notifier
                        .report(
                            ErrorContext::new("partition-flush", &e)
                                .partition(self.partition)
                                .position(first.offset, first.sequence_number),
                        )
                        .await;
                    tokio::select! {
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(self.ctx.settings.retry_backoff) => {}
                    }
                }
            }
        };

        info!(partition = self.partition, offset = position, "Partition stopped");
        result
    }

    /// Resolves the first offset to read. `None` when cancelled first.
    async fn initialize(&self, cancel: &CancellationToken) -> Option<i64> {
        loop {
            match self.initial_position().await {
                Ok(position) => return Some(position),
                Err(e) => {
                    self.ctx
                        .notifier
                        .report(ErrorContext::new("partition-init", &e).partition(self.partition))
                        .await;
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(self.ctx.settings.retry_backoff) => {}
                    }
                }
            }
        }
    }

    async fn initial_position(&self) -> Result<i64> {
        match self.ctx.checkpoints.load(&self.key).await? {
            Some(checkpoint) => {
                debug!(partition = %self.key, offset = checkpoint.offset, "Resuming from checkpoint");
                Ok(checkpoint.next_offset())
            }
            None => {
                let start = self.ctx.settings.start_position;
                debug!(partition = %self.key, position = ?start, "No checkpoint, using start position");
                self.ctx.source.resolve_start(self.partition, start).await
            }
        }
    }

    /// Stages every event, flushes once, then checkpoints the last event.
    ///
    /// Returns `Err` only when the flush fails; the checkpoint is untouched
    /// in that case.
    pub async fn process_batch(&self, events: &[RawEnvelope]) -> Result<BatchOutcome> {
        let Some(last) = events.last() else {
            return Ok(BatchOutcome {
                events: 0,
                skipped: 0,
                next_offset: 0,
                checkpoint_saved: false,
            });
        };
        let start = Instant::now();
        let mut write_set = WriteSet::new();
        let mut skipped = 0;

        for event in events {
            if let Err(e) = self.ctx.dispatcher.stage(&mut write_set, &event.payload) {
                skipped += 1;
                warn!(
                    partition = event.partition_id,
                    offset = event.offset,
                    sequence_number = event.sequence_number,
                    enqueued_at = ?event.enqueued_at,
                    device_id = ?e.device_id,
                    error_code = ?e.error.error_code(),
                    "Skipping event: {}",
                    e
                );
            }
        }

        self.ctx.dispatcher.flush(&write_set).await?;

        let checkpoint = Checkpoint {
            offset: last.offset,
            sequence_number: last.sequence_number,
        };
        let checkpoint_saved = match self.ctx.checkpoints.save(&self.key, checkpoint).await {
            Ok(()) => {
                metrics().checkpoints_saved.inc();
                true
            }
            Err(e) => {
                metrics().checkpoint_errors.inc();
                self.ctx
                    .notifier
                    .report(
                        ErrorContext::new("checkpoint", &e)
                            .partition(self.partition)
                            .position(last.offset, last.sequence_number),
                    )
                    .await;
                false
            }
        };

        let elapsed = start.elapsed();
        metrics().batches_processed.inc();
        metrics().batch_latency_ms.observe(elapsed.as_millis() as u64);
        debug!(
            partition = self.partition,
            events = events.len(),
            skipped,
            staged = write_set.len(),
            offset = last.offset,
            latency_ms = %elapsed.as_millis(),
            "Processed batch"
        );

        Ok(BatchOutcome {
            events: events.len(),
            skipped,
            next_offset: last.offset + 1,
            checkpoint_saved,
        })
    }
}

struct PartitionTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns one task per assigned partition.
pub struct PartitionManager {
    ctx: PipelineContext,
    tasks: HashMap<i32, PartitionTask>,
}

impl PartitionManager {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            tasks: HashMap::new(),
        }
    }

    /// Applies assignments until `cancel` fires, then drains every task.
    pub async fn run(
        mut self,
        mut assignments: mpsc::Receiver<PartitionAssignment>,
        cancel: CancellationToken,
    ) {
        info!(stream = %self.ctx.source.stream_id(), "Partition manager started");

        loop {
            let assignment = tokio::select! {
                _ = cancel.cancelled() => break,
                assignment = assignments.recv() => assignment,
            };

            match assignment {
                Some(PartitionAssignment::Assigned(partition)) => self.assign(partition, &cancel),
                Some(PartitionAssignment::Revoked(partition)) => self.revoke(partition).await,
                None => {
                    debug!("Assignment channel closed");
                    cancel.cancelled().await;
                    break;
                }
            }
        }

        self.shutdown().await;
        info!("Partition manager stopped");
    }

    pub fn assign(&mut self, partition: i32, parent: &CancellationToken) {
        if self.tasks.contains_key(&partition) {
            debug!(partition, "Partition already assigned");
            return;
        }

        let cancel = parent.child_token();
        let handle = tokio::spawn(supervise(partition, self.ctx.clone(), cancel.clone()));
        self.tasks.insert(partition, PartitionTask { cancel, handle });
        metrics().active_partitions.inc();
        info!(partition, "Partition assigned");
    }

    pub async fn revoke(&mut self, partition: i32) {
        let Some(task) = self.tasks.remove(&partition) else {
            debug!(partition, "Revoked partition was not assigned");
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            error!(partition, "Partition task panicked: {}", e);
        }
        metrics().active_partitions.dec();
        info!(partition, "Partition revoked");
    }

    async fn shutdown(&mut self) {
        let partitions: Vec<i32> = self.tasks.keys().copied().collect();
        for partition in partitions {
            self.revoke(partition).await;
        }
    }
}

/// Runs a partition consumer, restarting it after fatal errors.
async fn supervise(partition: i32, ctx: PipelineContext, cancel: CancellationToken) {
    loop {
        let consumer = PartitionConsumer::new(partition, ctx.clone());
        match consumer.run(cancel.clone()).await {
            Ok(()) => break,
            Err(e) => {
                metrics().partition_restarts.inc();
                ctx.notifier
                    .report(ErrorContext::new("partition", &e).partition(partition))
                    .await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(ctx.settings.retry_backoff) => {}
                }
                info!(partition, "Restarting partition");
            }
        }
    }
}
