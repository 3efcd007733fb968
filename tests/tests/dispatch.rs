//! Dispatcher tests: decode -> project -> flush against the mock store.

use engine_core::{ProcedureParam, ProjectionRecord, DEVICE_PULSE_PROCEDURE, LINE_PULSE_PROCEDURE};
use integration_tests::fixtures::{bytes, empty_pathway, envelope, malformed, plc, pulse};
use integration_tests::mocks::MockStore;
use serde_json::json;
use std::sync::Arc;
use worker::{Dispatcher, FlushSummary, WriteSet};

fn dispatcher() -> (Dispatcher, MockStore) {
    let store = MockStore::new();
    (Dispatcher::new(Arc::new(store.clone())), store)
}

#[tokio::test]
async fn test_plc_fields_are_normalized() {
    let (dispatcher, store) = dispatcher();
    dispatcher.dispatch(&bytes(&plc("press-01", "12.345"))).await.unwrap();

    let records = store.records();
    assert_eq!(records.len(), 1);
    let ProjectionRecord::Process(process) = &records[0] else {
        panic!("expected process record, got {}", records[0].name());
    };
    assert_eq!(process.pressure.as_deref(), Some("12.35"));
    assert_eq!(process.temperature, None);
    assert_eq!(process.cycle_time, 12.0);
}

#[tokio::test]
async fn test_pulse_routing() {
    let (dispatcher, store) = dispatcher();

    let summary = dispatcher.dispatch(&bytes(&pulse("m-1", 0, false))).await.unwrap();
    assert_eq!(summary, FlushSummary::default());

    dispatcher.dispatch(&bytes(&pulse("m-1", 3, false))).await.unwrap();
    dispatcher.dispatch(&bytes(&pulse("line-1", 2, true))).await.unwrap();

    let calls = store.procedure_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name, DEVICE_PULSE_PROCEDURE);
    assert_eq!(calls[0].params[1], ProcedureParam::Str("m-1".into()));
    assert_eq!(calls[0].params[2], ProcedureParam::Str("2024-05-02 08:00:00".into()));
    assert_eq!(calls[0].params[3], ProcedureParam::Int(3));
    assert_eq!(calls[1].name, LINE_PULSE_PROCEDURE);
    assert_eq!(calls[1].params[5], ProcedureParam::Bool(true));
    assert_eq!(store.record_count(), 0);
}

#[tokio::test]
async fn test_unknown_kind_makes_no_storage_call() {
    let (dispatcher, store) = dispatcher();
    let summary = dispatcher
        .dispatch(&bytes(&envelope("x", "Weather", json!([]))))
        .await
        .unwrap();

    assert_eq!(summary, FlushSummary::default());
    assert_eq!(store.attempts(), 0);
}

#[tokio::test]
async fn test_empty_pathway_emits_position_and_count() {
    let (dispatcher, store) = dispatcher();
    dispatcher.dispatch(&bytes(&empty_pathway("cam-01"))).await.unwrap();

    let names: Vec<&str> = store.records().iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["person_tracking", "person_count"]);
    let ProjectionRecord::PersonCount(count) = &store.records()[1] else {
        panic!("expected person count record");
    };
    assert_eq!(count.total_person_count, 2);
}

#[tokio::test]
async fn test_batch_stages_then_flushes_once() {
    let (dispatcher, store) = dispatcher();
    let mut write_set = WriteSet::new();

    assert_eq!(dispatcher.stage(&mut write_set, &bytes(&plc("a", "1"))).unwrap(), 1);
    assert!(dispatcher.stage(&mut write_set, &malformed()).is_err());
    assert_eq!(dispatcher.stage(&mut write_set, &bytes(&pulse("b", 1, false))).unwrap(), 1);
    assert_eq!(write_set.len(), 2);

    let summary = dispatcher.flush(&write_set).await.unwrap();
    assert_eq!(summary, FlushSummary { procedures: 1, records: 1 });
    assert_eq!(store.attempts(), 2);
}

#[tokio::test]
async fn test_store_failure_surfaces() {
    let (dispatcher, store) = dispatcher();
    store.fail_next(1);

    let err = dispatcher.dispatch(&bytes(&plc("a", "1"))).await.unwrap_err();
    assert_eq!(err.error_code(), Some("STORE_001"));
    assert_eq!(store.record_count(), 0);
}
