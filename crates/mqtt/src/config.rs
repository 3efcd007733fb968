//! MQTT broker configuration.

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MqttConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Topic filter to subscribe to
    #[serde(default = "default_topic")]
    #[validate(length(min = 1))]
    pub topic: String,
    #[serde(default = "default_client_id")]
    #[validate(length(min = 1, max = 128))]
    pub client_id: String,
    /// 0 = at most once, 1 = at least once, 2 = exactly once
    #[serde(default = "default_qos")]
    #[validate(range(max = 2))]
    pub qos: u8,
    /// Supervisor tick
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 10, max = 60000))]
    pub poll_interval_ms: u64,
    #[serde(default = "default_keep_alive_secs")]
    #[validate(range(min = 5, max = 3600))]
    pub keep_alive_secs: u64,
    /// Longest wait for the broker's CONNACK
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Buffered messages between the network pump and the handler
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1, max = 65536))]
    pub channel_capacity: usize,
}

fn default_port() -> u16 {
    1883
}

fn default_topic() -> String {
    "telemetry/#".to_string()
}

fn default_client_id() -> String {
    "telemetry-ingest".to_string()
}

fn default_qos() -> u8 {
    1
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    256
}

impl MqttConfig {
    pub fn qos(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Username and password, only when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port(),
            username: None,
            password: None,
            topic: default_topic(),
            client_id: default_client_id(),
            qos: default_qos(),
            poll_interval_ms: default_poll_interval_ms(),
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MqttConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.qos(), QoS::AtLeastOnce);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_qos_out_of_range() {
        let config = MqttConfig {
            qos: 3,
            ..MqttConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let config = MqttConfig {
            username: Some("gateway".into()),
            ..MqttConfig::default()
        };
        assert!(config.credentials().is_none());

        let config = MqttConfig {
            password: Some("secret".into()),
            ..config
        };
        assert_eq!(config.credentials(), Some(("gateway", "secret")));
    }
}
