//! Push subscriber tests: scripted broker -> dispatcher -> store.

use integration_tests::fixtures::{bytes, malformed, packing, plc};
use integration_tests::mocks::{ConnectScript, MockConnector, MockStore, RecordingNotifier};
use integration_tests::wait_until;
use mqtt_client::{ConnectionState, InboundMessage, PushSubscriber};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use worker::{DispatchHandler, Dispatcher};

const POLL: Duration = Duration::from_millis(20);
const TIMEOUT: Duration = Duration::from_secs(5);

fn message(payload: Vec<u8>) -> InboundMessage {
    InboundMessage::new("telemetry/line-1", payload)
}

fn subscriber(connector: &MockConnector, store: &MockStore) -> PushSubscriber {
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(store.clone())));
    PushSubscriber::new(
        Arc::new(connector.clone()),
        Arc::new(DispatchHandler::new(dispatcher, Arc::new(RecordingNotifier::new()))),
        POLL,
    )
}

/// Bad messages are isolated; good ones around them are still stored.
#[tokio::test]
async fn test_messages_are_handled_independently() {
    let store = MockStore::new();
    let connector = MockConnector::new(vec![
        ConnectScript::Fail,
        ConnectScript::Session(vec![
            message(bytes(&plc("press-01", "5"))),
            message(Vec::new()),
            message(malformed()),
            message(bytes(&packing("pack-01"))),
        ]),
    ]);
    let subscriber = subscriber(&connector, &store);
    let state = subscriber.state_handle();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(subscriber.run(cancel.clone()));

    assert!(wait_until(TIMEOUT, || store.record_count() == 2).await);
    assert_eq!(*state.lock(), ConnectionState::Connected);
    assert_eq!(connector.attempts(), 2);
    let names: Vec<&str> = store.records().iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["process", "packing"]);

    cancel.cancel();
    task.await.unwrap();
}

/// A dropped session flips the state and the supervisor reconnects.
#[tokio::test]
async fn test_reconnects_after_session_loss() {
    let store = MockStore::new();
    let connector = MockConnector::new(vec![ConnectScript::Session(vec![message(bytes(
        &plc("press-01", "1"),
    ))])]);
    let subscriber = subscriber(&connector, &store);
    let state = subscriber.state_handle();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(subscriber.run(cancel.clone()));
    assert!(wait_until(TIMEOUT, || store.record_count() == 1).await);

    connector.push(ConnectScript::Session(vec![message(bytes(&plc("press-02", "2")))]));
    connector.drop_sessions();

    assert!(wait_until(TIMEOUT, || store.record_count() == 2).await);
    assert!(wait_until(TIMEOUT, || *state.lock() == ConnectionState::Connected).await);
    assert_eq!(connector.attempts(), 2);

    cancel.cancel();
    task.await.unwrap();
}

/// Store failures are logged per message and never drop the connection.
#[tokio::test]
async fn test_store_failure_keeps_connection() {
    let store = MockStore::new();
    store.fail_next(1);
    let connector = MockConnector::new(vec![ConnectScript::Session(vec![
        message(bytes(&plc("a", "1"))),
        message(bytes(&plc("b", "2"))),
    ])]);
    let subscriber = subscriber(&connector, &store);
    let state = subscriber.state_handle();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(subscriber.run(cancel.clone()));

    assert!(wait_until(TIMEOUT, || store.record_count() == 1).await);
    assert_eq!(store.attempts(), 2);
    assert_eq!(*state.lock(), ConnectionState::Connected);
    assert_eq!(connector.attempts(), 1);

    cancel.cancel();
    task.await.unwrap();
}
