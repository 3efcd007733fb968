//! Mock implementations of the transport, storage and notification seams.

use async_trait::async_trait;
use engine_core::{
    Checkpoint, CheckpointStore, Error, InMemoryCheckpointStore, PartitionKey, PartitionSource,
    ProcedureCall, ProjectionRecord, RawEnvelope, Result, StartPosition, TelemetryStore,
};
use engine_core::error::{CheckpointErrorCode, StoreErrorCode};
use mqtt_client::{BrokerConnector, BrokerSession, InboundMessage};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use worker::{ErrorContext, Notifier};

/// Telemetry store that captures writes in memory.
#[derive(Clone, Default)]
pub struct MockStore {
    records: Arc<Mutex<Vec<ProjectionRecord>>>,
    calls: Arc<Mutex<Vec<ProcedureCall>>>,
    /// Number of upcoming writes that fail.
    failures: Arc<Mutex<usize>>,
    attempts: Arc<Mutex<usize>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` writes fail.
    pub fn fail_next(&self, n: usize) {
        *self.failures.lock() = n;
    }

    pub fn records(&self) -> Vec<ProjectionRecord> {
        self.records.lock().clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn procedure_calls(&self) -> Vec<ProcedureCall> {
        self.calls.lock().clone()
    }

    /// Writes attempted, failed ones included.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    fn check_failure(&self) -> Result<()> {
        *self.attempts.lock() += 1;
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::storage(StoreErrorCode::InsertFailed, "mock store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for MockStore {
    async fn insert_many(&self, records: &[ProjectionRecord]) -> Result<()> {
        self.check_failure()?;
        self.records.lock().extend_from_slice(records);
        Ok(())
    }

    async fn execute_procedure(&self, call: &ProcedureCall) -> Result<()> {
        self.check_failure()?;
        self.calls.lock().push(call.clone());
        Ok(())
    }
}

/// Partition source over in-memory logs.
#[derive(Clone, Default)]
pub struct MockSource {
    logs: Arc<Mutex<HashMap<i32, Vec<RawEnvelope>>>>,
    fetches: Arc<Mutex<Vec<(i32, i64)>>>,
    /// Number of upcoming fetches that fail.
    fetch_failures: Arc<Mutex<usize>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends payloads to a partition log, assigning consecutive offsets.
    pub fn append(&self, partition: i32, payloads: &[Vec<u8>]) {
        let mut logs = self.logs.lock();
        let log = logs.entry(partition).or_default();
        for payload in payloads {
            let offset = log.len() as i64;
            log.push(RawEnvelope::new(partition, offset, payload.clone()));
        }
    }

    pub fn fail_next_fetches(&self, n: usize) {
        *self.fetch_failures.lock() = n;
    }

    /// `(partition, from_offset)` of every fetch, in order.
    pub fn fetches(&self) -> Vec<(i32, i64)> {
        self.fetches.lock().clone()
    }

    fn read(&self, partition: i32, from_offset: i64, max_events: usize) -> Vec<RawEnvelope> {
        self.logs
            .lock()
            .get(&partition)
            .map(|log| {
                log.iter()
                    .filter(|e| e.offset >= from_offset)
                    .take(max_events)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl PartitionSource for MockSource {
    fn stream_id(&self) -> &str {
        "mock-telemetry"
    }

    async fn resolve_start(&self, partition: i32, position: StartPosition) -> Result<i64> {
        Ok(match position {
            StartPosition::Earliest => 0,
            StartPosition::Latest => self
                .logs
                .lock()
                .get(&partition)
                .map_or(0, |log| log.len() as i64),
        })
    }

    async fn fetch(
        &self,
        partition: i32,
        from_offset: i64,
        max_events: usize,
        max_wait: Duration,
    ) -> Result<Vec<RawEnvelope>> {
        self.fetches.lock().push((partition, from_offset));
        {
            let mut failures = self.fetch_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::transport("mock fetch failure"));
            }
        }

        let events = self.read(partition, from_offset, max_events);
        if events.is_empty() {
            tokio::time::sleep(max_wait).await;
        }
        Ok(events)
    }
}

/// Checkpoint store whose saves can be made to fail.
#[derive(Clone, Default)]
pub struct MockCheckpointStore {
    inner: Arc<InMemoryCheckpointStore>,
    fail_saves: Arc<Mutex<bool>>,
}

impl MockCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    pub fn get(&self, key: &PartitionKey) -> Option<Checkpoint> {
        self.inner.get(key)
    }
}

#[async_trait]
impl CheckpointStore for MockCheckpointStore {
    async fn load(&self, key: &PartitionKey) -> Result<Option<Checkpoint>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &PartitionKey, checkpoint: Checkpoint) -> Result<()> {
        if *self.fail_saves.lock() {
            return Err(Error::checkpoint(
                CheckpointErrorCode::SaveFailed,
                "mock checkpoint failure",
            ));
        }
        self.inner.save(key, checkpoint).await
    }
}

/// Outcome of one scripted connect attempt.
pub enum ConnectScript {
    Fail,
    Session(Vec<InboundMessage>),
}

/// Broker connector that replays scripted connect outcomes.
///
/// Sessions stay open until [`MockConnector::drop_sessions`] is called.
/// Connects beyond the script fail.
#[derive(Clone, Default)]
pub struct MockConnector {
    script: Arc<Mutex<VecDeque<ConnectScript>>>,
    senders: Arc<Mutex<Vec<mpsc::Sender<InboundMessage>>>>,
    attempts: Arc<Mutex<usize>>,
}

impl MockConnector {
    pub fn new(script: Vec<ConnectScript>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    pub fn push(&self, step: ConnectScript) {
        self.script.lock().push_back(step);
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    /// Closes every open session, as a broker disconnect would.
    pub fn drop_sessions(&self) {
        self.senders.lock().clear();
    }
}

#[async_trait]
impl BrokerConnector for MockConnector {
    async fn connect(&self) -> Result<BrokerSession> {
        *self.attempts.lock() += 1;
        let step = self.script.lock().pop_front();
        match step {
            Some(ConnectScript::Session(messages)) => {
                let (tx, rx) = mpsc::channel(messages.len().max(1));
                for message in messages {
                    tx.try_send(message)
                        .map_err(|e| Error::internal(format!("mock session full: {}", e)))?;
                }
                self.senders.lock().push(tx);
                Ok(BrokerSession::new(rx))
            }
            Some(ConnectScript::Fail) | None => Err(Error::transport("mock broker unreachable")),
        }
    }
}

/// Notifier that records every report.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    reports: Arc<Mutex<Vec<ErrorContext>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorContext> {
        self.reports.lock().clone()
    }

    pub fn components(&self) -> Vec<String> {
        self.reports.lock().iter().map(|r| r.component.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn report(&self, context: ErrorContext) {
        self.reports.lock().push(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_reads_from_offset() {
        let source = MockSource::new();
        source.append(0, &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let events = source.fetch(0, 1, 10, Duration::ZERO).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].offset, 1);
        assert_eq!(source.fetches(), vec![(0, 1)]);
    }

    #[tokio::test]
    async fn test_mock_store_failure_budget() {
        let store = MockStore::new();
        store.fail_next(1);
        assert!(store.insert_many(&[]).await.is_err());
        assert!(store.insert_many(&[]).await.is_ok());
        assert_eq!(store.attempts(), 2);
    }
}
