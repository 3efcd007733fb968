//! Redpanda health checks.

use crate::config::RedpandaConfig;
use crate::source::connect;
use std::collections::HashSet;
use tracing::{debug, error};

/// Check Redpanda connection health.
pub async fn check_connection(config: &RedpandaConfig) -> bool {
    let client = match connect(config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to Redpanda: {}", e);
            return false;
        }
    };

    match client.list_topics().await {
        Ok(topics) => {
            debug!(topics = topics.len(), "Redpanda connection healthy");
            true
        }
        Err(e) => {
            error!("Failed to list Redpanda topics: {}", e);
            false
        }
    }
}

/// Returns the subset of `topics` missing on the broker.
///
/// Every topic is reported missing when the broker cannot be reached.
pub async fn missing_topics(config: &RedpandaConfig, topics: &[&str]) -> Vec<String> {
    let existing: HashSet<String> = match connect(config).await {
        Ok(client) => match client.list_topics().await {
            Ok(list) => list.into_iter().map(|t| t.name).collect(),
            Err(_) => HashSet::new(),
        },
        Err(_) => HashSet::new(),
    };

    topics
        .iter()
        .filter(|t| !existing.contains(**t))
        .map(|t| t.to_string())
        .collect()
}
