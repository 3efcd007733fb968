//! ClickHouse configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    #[validate(url)]
    pub url: String,
    #[serde(default = "default_database")]
    #[validate(length(min = 1))]
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    /// Create missing tables at start-up
    #[serde(default = "default_init_schema")]
    pub init_schema: bool,
}

fn default_database() -> String {
    "telemetry".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_init_schema() -> bool {
    true
}

impl ClickHouseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: default_database(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            init_schema: default_init_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ClickHouseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_url_rejected() {
        let config = ClickHouseConfig {
            url: "not a url".into(),
            ..ClickHouseConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
