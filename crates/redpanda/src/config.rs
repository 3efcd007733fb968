//! Redpanda stream configuration.

use engine_core::StartPosition;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Partitioned stream consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedpandaConfig {
    /// Broker addresses
    #[validate(length(min = 1))]
    pub brokers: Vec<String>,
    /// SASL username (enables TLS + SCRAM-SHA-256 when set with a password)
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<String>,
    #[serde(default = "default_topic")]
    #[validate(length(min = 1))]
    pub topic: String,
    /// Checkpoint namespace for this deployment
    #[serde(default = "default_consumer_group")]
    #[validate(length(min = 1))]
    pub consumer_group: String,
    /// Fixed partition list. Discovered from topic metadata when unset.
    #[serde(default)]
    pub partitions: Option<Vec<i32>>,
    /// Max events handed to the dispatcher per batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 10000))]
    pub batch_size: usize,
    /// Events requested from the broker per fetch
    #[serde(default = "default_prefetch_count")]
    #[validate(range(min = 1, max = 100000))]
    pub prefetch_count: usize,
    /// Longest wait for the first event of a batch
    #[serde(default = "default_max_wait_ms")]
    #[validate(range(min = 1, max = 300000))]
    pub max_wait_ms: u64,
    /// Start position for partitions without a checkpoint
    #[serde(default)]
    pub start_position: StartPosition,
    /// Delay before restarting a failed partition or retrying a failed flush
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,
    /// Assumed upper bound of one event, used to size fetch requests
    #[serde(default = "default_max_event_bytes")]
    pub max_event_bytes: usize,
}

fn default_topic() -> String {
    "equipment-telemetry".to_string()
}

fn default_consumer_group() -> String {
    "telemetry-ingest".to_string()
}

fn default_batch_size() -> usize {
    256
}

fn default_prefetch_count() -> usize {
    512
}

fn default_max_wait_ms() -> u64 {
    30_000
}

fn default_restart_backoff_ms() -> u64 {
    5_000
}

fn default_max_event_bytes() -> usize {
    64 * 1024
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            sasl_username: None,
            sasl_password: None,
            topic: default_topic(),
            consumer_group: default_consumer_group(),
            partitions: None,
            batch_size: default_batch_size(),
            prefetch_count: default_prefetch_count(),
            max_wait_ms: default_max_wait_ms(),
            start_position: StartPosition::default(),
            restart_backoff_ms: default_restart_backoff_ms(),
            max_event_bytes: default_max_event_bytes(),
        }
    }
}

impl RedpandaConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    /// Byte budget of one fetch request.
    pub fn fetch_max_bytes(&self) -> i32 {
        let bytes = self.prefetch_count.max(self.batch_size) * self.max_event_bytes;
        i32::try_from(bytes).unwrap_or(i32::MAX)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}
