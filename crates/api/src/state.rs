//! Application state shared across handlers.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Process identity reported by the health endpoints.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

#[derive(Debug)]
struct StateInner {
    environment: String,
    transport: String,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(environment: impl Into<String>, transport: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                environment: environment.into(),
                transport: transport.into(),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn environment(&self) -> &str {
        &self.inner.environment
    }

    /// Active ingress transport (`stream` or `mqtt`).
    pub fn transport(&self) -> &str {
        &self.inner.transport
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.inner.started_at).num_seconds().max(0)
    }
}
