//! MQTT push subscriber.
//!
//! A supervisor keeps one broker session alive and hands every inbound
//! message to a [`MessageHandler`]. The broker is reached through the
//! [`BrokerConnector`] seam; [`RumqttcConnector`] is the production
//! implementation.

pub mod config;
pub mod connector;
pub mod subscriber;

pub use config::MqttConfig;
pub use connector::{BrokerConnector, BrokerSession, InboundMessage, RumqttcConnector};
pub use subscriber::{ConnectionState, MessageHandler, PushSubscriber};
