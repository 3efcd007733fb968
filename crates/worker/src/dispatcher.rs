//! Decode, project, stage and flush.
//!
//! Records from one batch (or one pushed message) are staged in a
//! [`WriteSet`] and written as one unit: pulse procedures first, then the
//! remaining records in a single `insert_many`.

use crate::projection::Projector;
use engine_core::{decode, Error, ProcedureCall, ProjectionRecord, Result, TelemetryStore};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::debug;

/// Records staged for one flush.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteSet {
    records: Vec<ProjectionRecord>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, records: impl IntoIterator<Item = ProjectionRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ProjectionRecord] {
        &self.records
    }

    /// Splits into procedure calls (pulses) and insertable records.
    pub fn split(&self) -> (Vec<ProcedureCall>, Vec<ProjectionRecord>) {
        let mut calls = Vec::new();
        let mut inserts = Vec::new();
        for record in &self.records {
            match record {
                ProjectionRecord::Pulse(pulse) => calls.push(pulse.procedure_call()),
                other => inserts.push(other.clone()),
            }
        }
        (calls, inserts)
    }
}

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub procedures: usize,
    pub records: usize,
}

/// A rejected event.
#[derive(Debug)]
pub struct StageError {
    /// Known once the envelope decodes
    pub device_id: Option<String>,
    pub error: Error,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for StageError {}

impl From<StageError> for Error {
    fn from(e: StageError) -> Self {
        e.error
    }
}

pub struct Dispatcher {
    store: Arc<dyn TelemetryStore>,
    projector: Projector,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            store,
            projector: Projector::new(),
        }
    }

    /// Decodes and projects one payload into `write_set`.
    ///
    /// Returns the number of staged records. Errors are per event; nothing is
    /// staged when one is returned.
    pub fn stage(
        &self,
        write_set: &mut WriteSet,
        payload: &[u8],
    ) -> std::result::Result<usize, StageError> {
        metrics().events_received.inc();

        let envelope = decode(payload).map_err(|error| {
            metrics().decode_errors.inc();
            StageError {
                device_id: None,
                error,
            }
        })?;
        let records = self.projector.project(&envelope, payload).map_err(|error| {
            metrics().projection_errors.inc();
            StageError {
                device_id: Some(envelope.device_id.clone()).filter(|id| !id.is_empty()),
                error,
            }
        })?;

        let staged = records.len();
        metrics().records_projected.inc_by(staged as u64);
        write_set.stage(records);
        Ok(staged)
    }

    /// Writes the staged records. An empty set performs no storage call.
    pub async fn flush(&self, write_set: &WriteSet) -> Result<FlushSummary> {
        if write_set.is_empty() {
            return Ok(FlushSummary::default());
        }

        let start = Instant::now();
        let (calls, inserts) = write_set.split();

        for call in &calls {
            self.store
                .execute_procedure(call)
                .await
                .inspect_err(|_| metrics().flush_errors.inc())?;
        }
        if !inserts.is_empty() {
            self.store
                .insert_many(&inserts)
                .await
                .inspect_err(|_| metrics().flush_errors.inc())?;
        }

        let summary = FlushSummary {
            procedures: calls.len(),
            records: inserts.len(),
        };
        debug!(
            procedures = summary.procedures,
            records = summary.records,
            latency_ms = %start.elapsed().as_millis(),
            "Flushed write set"
        );
        Ok(summary)
    }

    /// Stages and flushes a single payload.
    pub async fn dispatch(&self, payload: &[u8]) -> Result<FlushSummary> {
        let mut write_set = WriteSet::new();
        self.stage(&mut write_set, payload)?;
        self.flush(&write_set).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TelemetryStore for Recording {
        async fn insert_many(&self, records: &[ProjectionRecord]) -> Result<()> {
            self.calls.lock().push(format!("insert:{}", records.len()));
            Ok(())
        }

        async fn execute_procedure(&self, call: &ProcedureCall) -> Result<()> {
            self.calls.lock().push(format!("procedure:{}", call.name));
            Ok(())
        }
    }

    const PULSE: &str = r#"{"deviceId":"p1","created":"2024-05-02T08:00:00Z","type":"Pulse",
        "tags":[{"name":"pulses","value":"2"}]}"#;
    const PLC: &str = r#"{"deviceId":"p1","created":"2024-05-02T08:00:00Z","type":"Plc","tags":[]}"#;

    #[tokio::test]
    async fn test_procedures_before_inserts() {
        let store = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(store.clone());
        let mut write_set = WriteSet::new();

        dispatcher.stage(&mut write_set, PLC.as_bytes()).unwrap();
        dispatcher.stage(&mut write_set, PULSE.as_bytes()).unwrap();
        let summary = dispatcher.flush(&write_set).await.unwrap();

        assert_eq!(summary, FlushSummary { procedures: 1, records: 1 });
        assert_eq!(
            *store.calls.lock(),
            vec!["procedure:insert_pulse_telemetry".to_string(), "insert:1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_write_set_skips_store() {
        let store = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(store.clone());

        let unknown = r#"{"deviceId":"x","created":"2024-05-02T08:00:00Z","type":"Weather"}"#;
        let summary = dispatcher.dispatch(unknown.as_bytes()).await.unwrap();

        assert_eq!(summary, FlushSummary::default());
        assert!(store.calls.lock().is_empty());
    }

    #[test]
    fn test_decode_error_stages_nothing() {
        let dispatcher = Dispatcher::new(Arc::new(Recording::default()));
        let mut write_set = WriteSet::new();
        let err = dispatcher.stage(&mut write_set, b"{oops").unwrap_err();
        assert_eq!(err.device_id, None);
        assert!(write_set.is_empty());
    }

    #[test]
    fn test_projection_error_keeps_device_id() {
        let dispatcher = Dispatcher::new(Arc::new(Recording::default()));
        let mut write_set = WriteSet::new();

        let bad_health = r#"{"deviceId":"dev-x","created":"2024-05-02T08:00:00Z","type":"Health",
            "tags":[],"deviceInformation":42}"#;
        let err = dispatcher.stage(&mut write_set, bad_health.as_bytes()).unwrap_err();

        assert_eq!(err.device_id.as_deref(), Some("dev-x"));
        assert!(err.error.is_per_event());
        assert!(write_set.is_empty());
    }
}
