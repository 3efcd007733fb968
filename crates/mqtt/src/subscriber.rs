//! Supervised push subscription.
//!
//! State machine: `Disconnected -> Connecting -> Connected -> Disconnected`.
//! The supervisor ticks every poll interval and connects when disconnected;
//! a pump task drains the session and flips the state back when it ends.

use crate::connector::{BrokerConnector, BrokerSession, InboundMessage};
use async_trait::async_trait;
use engine_core::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Processes one inbound message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<()>;
}

pub struct PushSubscriber {
    connector: Arc<dyn BrokerConnector>,
    handler: Arc<dyn MessageHandler>,
    poll_interval: Duration,
    state: Arc<Mutex<ConnectionState>>,
}

impl PushSubscriber {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        handler: Arc<dyn MessageHandler>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            connector,
            handler,
            poll_interval,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Handle for observing the connection state from another task.
    pub fn state_handle(&self) -> Arc<Mutex<ConnectionState>> {
        self.state.clone()
    }

    /// Runs until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        health().broker.track();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pump: Option<JoinHandle<()>> = None;
        let mut connected_once = false;

        info!(poll_interval_ms = %self.poll_interval.as_millis(), "Push subscriber started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.state() {
                ConnectionState::Disconnected => {
                    if connected_once {
                        metrics().mqtt_reconnects.inc();
                    }
                    *self.state.lock() = ConnectionState::Connecting;

                    match self.connector.connect().await {
                        Ok(session) => {
                            connected_once = true;
                            *self.state.lock() = ConnectionState::Connected;
                            metrics().broker_connected.set(1);
                            health().broker.set_healthy();
                            pump = Some(self.spawn_pump(session, cancel.clone()));
                        }
                        Err(e) => {
                            error!("Failed to connect to broker: {}", e);
                            *self.state.lock() = ConnectionState::Disconnected;
                            metrics().broker_connected.set(0);
                            health().broker.set_unhealthy(e.to_string());
                        }
                    }
                }
                ConnectionState::Connecting => {}
                ConnectionState::Connected => {
                    debug!("Broker connection healthy");
                }
            }
        }

        if let Some(pump) = pump {
            let _ = pump.await;
        }
        metrics().broker_connected.set(0);
        info!("Push subscriber stopped");
    }

    fn spawn_pump(&self, mut session: BrokerSession, cancel: CancellationToken) -> JoinHandle<()> {
        let handler = self.handler.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = cancel.cancelled() => return,
                    message = session.next() => message,
                };

                let Some(message) = message else {
                    warn!("Broker session closed");
                    *state.lock() = ConnectionState::Disconnected;
                    metrics().broker_connected.set(0);
                    health().broker.set_unhealthy("session closed");
                    return;
                };

                metrics().mqtt_messages.inc();
                if message.payload.is_empty() {
                    debug!(topic = %message.topic, "Ignoring empty message");
                    continue;
                }

                let topic = message.topic.clone();
                if let Err(e) = handler.handle(message).await {
                    error!(topic = %topic, error_code = ?e.error_code(), "Failed to handle message: {}", e);
                }
            }
        })
    }
}
