//! Broker connection seam.

use crate::config::MqttConfig;
use async_trait::async_trait;
use bytes::Bytes;
use engine_core::{Error, Result};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// A subscribed broker session.
///
/// Yields messages until the connection drops, then returns `None`.
pub struct BrokerSession {
    messages: mpsc::Receiver<InboundMessage>,
}

impl BrokerSession {
    pub fn new(messages: mpsc::Receiver<InboundMessage>) -> Self {
        Self { messages }
    }

    pub async fn next(&mut self) -> Option<InboundMessage> {
        self.messages.recv().await
    }
}

/// Opens subscribed broker sessions.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<BrokerSession>;
}

/// [`BrokerConnector`] over `rumqttc` with a clean session per connect.
pub struct RumqttcConnector {
    config: MqttConfig,
}

impl RumqttcConnector {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_clean_session(true);
        options.set_keep_alive(self.config.keep_alive());
        if let Some((username, password)) = self.config.credentials() {
            options.set_credentials(username, password);
        }
        options
    }
}

#[async_trait]
impl BrokerConnector for RumqttcConnector {
    async fn connect(&self) -> Result<BrokerSession> {
        let (client, mut eventloop) =
            AsyncClient::new(self.options(), self.config.channel_capacity);

        let deadline = tokio::time::Instant::now() + self.config.connect_timeout();
        loop {
            let event = tokio::time::timeout_at(deadline, eventloop.poll())
                .await
                .map_err(|_| {
                    Error::transport(format!(
                        "timed out connecting to {}:{}",
                        self.config.host, self.config.port
                    ))
                })?
                .map_err(|e| Error::transport(format!("mqtt connect failed: {}", e)))?;

            if let Event::Incoming(Packet::ConnAck(ack)) = event {
                if ack.code != ConnectReturnCode::Success {
                    return Err(Error::transport(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )));
                }
                break;
            }
        }

        client
            .subscribe(self.config.topic.clone(), self.config.qos())
            .await
            .map_err(|e| Error::transport(format!("mqtt subscribe failed: {}", e)))?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            topic = %self.config.topic,
            client_id = %self.config.client_id,
            "Connected to MQTT broker"
        );

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        tokio::spawn(async move {
            // The client must outlive the event loop or requests stop flowing.
            let _client = client;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = InboundMessage {
                            topic: publish.topic,
                            payload: publish.payload,
                        };
                        if tx.send(message).await.is_err() {
                            debug!("Session receiver dropped, stopping MQTT pump");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        debug!(pkid = ack.pkid, "Subscription acknowledged");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT connection lost: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(BrokerSession::new(rx))
    }
}
