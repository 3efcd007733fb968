//! Component health registry.
//!
//! Only one ingress transport runs per process, so components are opt-in:
//! a component that was never [`ComponentHealth::track`]ed is left out of
//! the report and of readiness.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Health of one dependency.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    tracked: AtomicBool,
    healthy: AtomicBool,
    message: parking_lot::RwLock<Option<String>>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            tracked: AtomicBool::new(false),
            healthy: AtomicBool::new(false),
            message: parking_lot::RwLock::new(None),
        }
    }

    /// Includes this component in reports. Starts unhealthy.
    pub fn track(&self) {
        self.tracked.store(true, Ordering::Relaxed);
    }

    pub fn is_tracked(&self) -> bool {
        self.tracked.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self) {
        self.healthy.store(true, Ordering::Relaxed);
        *self.message.write() = None;
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.message.write() = Some(msg.into());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> Option<String> {
        self.message.read().clone()
    }

    fn report(&self) -> ComponentHealthReport {
        ComponentHealthReport {
            name: self.name.to_string(),
            healthy: self.is_healthy(),
            message: self.message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
}

pub struct HealthRegistry {
    /// Partitioned stream transport.
    pub stream: ComponentHealth,
    /// Pub/sub broker transport.
    pub broker: ComponentHealth,
    pub clickhouse: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            stream: ComponentHealth::new("stream"),
            broker: ComponentHealth::new("broker"),
            clickhouse: ComponentHealth::new("clickhouse"),
        }
    }

    fn tracked(&self) -> impl Iterator<Item = &ComponentHealth> {
        [&self.stream, &self.broker, &self.clickhouse]
            .into_iter()
            .filter(|c| c.is_tracked())
    }

    pub fn report(&self) -> HealthReport {
        let components: Vec<_> = self.tracked().map(ComponentHealth::report).collect();

        let all_healthy = components.iter().all(|c| c.healthy);
        let any_healthy = components.iter().any(|c| c.healthy);

        let status = if all_healthy {
            HealthStatus::Healthy
        } else if any_healthy {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport { status, components }
    }

    /// Ready when every tracked component is healthy.
    pub fn is_ready(&self) -> bool {
        self.tracked().all(ComponentHealth::is_healthy)
    }

    pub fn is_alive(&self) -> bool {
        true
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global health registry.
pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

pub fn health() -> &'static HealthRegistry {
    &HEALTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_components_are_ignored() {
        let registry = HealthRegistry::new();
        registry.stream.track();
        registry.clickhouse.track();
        registry.stream.set_healthy();
        registry.clickhouse.set_unhealthy("timeout");

        let report = registry.report();
        assert_eq!(report.components.len(), 2);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!registry.is_ready());

        registry.clickhouse.set_healthy();
        assert!(registry.is_ready());
        assert_eq!(registry.report().status, HealthStatus::Healthy);
    }
}
