//! Partition consumer tests: stream -> dispatcher -> store -> checkpoint.
//!
//! Uses the in-memory source, store and checkpoint mocks; no broker needed.

use engine_core::{Checkpoint, CheckpointStore, PartitionAssignment, PartitionKey, RawEnvelope, StartPosition};
use integration_tests::fixtures::{bytes, malformed, packing, plc};
use integration_tests::mocks::{MockCheckpointStore, MockSource, MockStore, RecordingNotifier};
use integration_tests::wait_until;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use worker::{Dispatcher, PartitionConsumer, PartitionManager, PartitionSettings, PipelineContext};

struct Harness {
    source: MockSource,
    store: MockStore,
    checkpoints: MockCheckpointStore,
    notifier: RecordingNotifier,
}

impl Harness {
    fn new() -> Self {
        Self {
            source: MockSource::new(),
            store: MockStore::new(),
            checkpoints: MockCheckpointStore::new(),
            notifier: RecordingNotifier::new(),
        }
    }

    fn settings() -> PartitionSettings {
        PartitionSettings {
            consumer_group: "test-group".to_string(),
            batch_size: 16,
            max_wait: Duration::from_millis(10),
            start_position: StartPosition::Earliest,
            retry_backoff: Duration::from_millis(10),
        }
    }

    fn context(&self) -> PipelineContext {
        PipelineContext {
            source: Arc::new(self.source.clone()),
            checkpoints: Arc::new(self.checkpoints.clone()),
            dispatcher: Arc::new(Dispatcher::new(Arc::new(self.store.clone()))),
            notifier: Arc::new(self.notifier.clone()),
            settings: Self::settings(),
        }
    }

    fn key(partition: i32) -> PartitionKey {
        PartitionKey::new("mock-telemetry", "test-group", partition)
    }

    fn checkpoint(&self, partition: i32) -> Option<i64> {
        self.checkpoints.get(&Self::key(partition)).map(|c| c.offset)
    }
}

fn batch(payloads: &[Vec<u8>]) -> Vec<RawEnvelope> {
    payloads
        .iter()
        .enumerate()
        .map(|(i, p)| RawEnvelope::new(0, 100 + i as i64, p.clone()))
        .collect()
}

/// Malformed events are skipped but still covered by the checkpoint.
#[tokio::test]
async fn test_checkpoint_covers_malformed_events() {
    let h = Harness::new();
    let consumer = PartitionConsumer::new(0, h.context());

    let events = batch(&[bytes(&plc("press-01", "12.345")), malformed(), bytes(&packing("pack-01"))]);
    let outcome = consumer.process_batch(&events).await.unwrap();

    assert_eq!(outcome.events, 3);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.next_offset, 103);
    assert!(outcome.checkpoint_saved);
    assert_eq!(h.checkpoint(0), Some(102));
    assert_eq!(h.store.record_count(), 2);
}

/// A failed flush leaves the checkpoint untouched.
#[tokio::test]
async fn test_flush_failure_keeps_checkpoint() {
    let h = Harness::new();
    let consumer = PartitionConsumer::new(0, h.context());
    let events = batch(&[bytes(&plc("press-01", "10"))]);

    h.store.fail_next(1);
    let err = consumer.process_batch(&events).await.unwrap_err();
    assert_eq!(err.error_code(), Some("STORE_001"));
    assert_eq!(h.checkpoint(0), None);

    consumer.process_batch(&events).await.unwrap();
    assert_eq!(h.checkpoint(0), Some(100));
}

/// A failed checkpoint save is reported and the position still advances.
#[tokio::test]
async fn test_checkpoint_failure_is_reported() {
    let h = Harness::new();
    let consumer = PartitionConsumer::new(0, h.context());
    h.checkpoints.set_fail_saves(true);

    let outcome = consumer
        .process_batch(&batch(&[bytes(&plc("press-01", "10"))]))
        .await
        .unwrap();

    assert!(!outcome.checkpoint_saved);
    assert_eq!(outcome.next_offset, 101);
    assert_eq!(h.store.record_count(), 1);
    assert_eq!(h.notifier.components(), vec!["checkpoint"]);
}

/// End to end through the manager: every event is consumed and checkpointed.
#[tokio::test]
async fn test_manager_consumes_assigned_partitions() {
    let h = Harness::new();
    h.source.append(0, &[bytes(&plc("press-01", "1")), bytes(&plc("press-02", "2"))]);
    h.source.append(1, &[bytes(&packing("pack-01")), malformed(), bytes(&packing("pack-02"))]);

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);
    let manager = tokio::spawn(PartitionManager::new(h.context()).run(rx, cancel.clone()));
    tx.send(PartitionAssignment::Assigned(0)).await.unwrap();
    tx.send(PartitionAssignment::Assigned(1)).await.unwrap();

    let done = wait_until(Duration::from_secs(5), || {
        h.checkpoint(0) == Some(1) && h.checkpoint(1) == Some(2)
    })
    .await;
    assert!(done, "partitions were not checkpointed");
    assert_eq!(h.store.record_count(), 4);

    cancel.cancel();
    manager.await.unwrap();
}

/// Consumption resumes after the saved checkpoint.
#[tokio::test]
async fn test_resumes_after_checkpoint() {
    let h = Harness::new();
    h.source.append(
        0,
        &[bytes(&plc("a", "1")), bytes(&plc("b", "2")), bytes(&plc("c", "3"))],
    );
    h.checkpoints
        .save(&Harness::key(0), Checkpoint { offset: 1, sequence_number: 1 })
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(PartitionConsumer::new(0, h.context()).run(cancel.clone()));

    assert!(wait_until(Duration::from_secs(5), || h.checkpoint(0) == Some(2)).await);
    assert_eq!(h.store.record_count(), 1);
    assert_eq!(h.source.fetches()[0], (0, 2));

    cancel.cancel();
    task.await.unwrap().unwrap();
}

/// The same batch is re-read until the flush succeeds.
#[tokio::test]
async fn test_failed_batch_is_redelivered() {
    let h = Harness::new();
    h.source.append(0, &[bytes(&plc("a", "1")), bytes(&plc("b", "2"))]);
    h.store.fail_next(2);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(PartitionConsumer::new(0, h.context()).run(cancel.clone()));

    assert!(wait_until(Duration::from_secs(5), || h.checkpoint(0) == Some(1)).await);
    let fetches = h.source.fetches();
    assert_eq!(&fetches[..3], &[(0, 0), (0, 0), (0, 0)]);
    assert_eq!(h.store.record_count(), 2);
    assert_eq!(h.store.attempts(), 3);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

/// A fetch error ends the task; the manager restarts the partition.
#[tokio::test]
async fn test_fetch_error_restarts_partition() {
    let h = Harness::new();
    h.source.append(0, &[bytes(&plc("a", "1"))]);
    h.source.fail_next_fetches(1);

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(1);
    let manager = tokio::spawn(PartitionManager::new(h.context()).run(rx, cancel.clone()));
    tx.send(PartitionAssignment::Assigned(0)).await.unwrap();

    assert!(wait_until(Duration::from_secs(5), || h.checkpoint(0) == Some(0)).await);
    assert!(h.notifier.components().contains(&"partition".to_string()));

    cancel.cancel();
    manager.await.unwrap();
}

/// Revoking a partition stops its task; a later assignment starts fresh.
#[tokio::test]
async fn test_revoke_then_reassign() {
    let h = Harness::new();
    h.source.append(0, &[bytes(&plc("a", "1"))]);

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(4);
    let manager = tokio::spawn(PartitionManager::new(h.context()).run(rx, cancel.clone()));

    tx.send(PartitionAssignment::Assigned(0)).await.unwrap();
    assert!(wait_until(Duration::from_secs(5), || h.checkpoint(0) == Some(0)).await);
    tx.send(PartitionAssignment::Revoked(0)).await.unwrap();

    h.source.append(0, &[bytes(&plc("b", "2"))]);
    tx.send(PartitionAssignment::Assigned(0)).await.unwrap();
    assert!(wait_until(Duration::from_secs(5), || h.checkpoint(0) == Some(1)).await);
    assert_eq!(h.store.record_count(), 2);

    cancel.cancel();
    manager.await.unwrap();
}
