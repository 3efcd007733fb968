//! In-process metrics.
//!
//! Plain atomics, read by the `/metrics` endpoint through [`Metrics::snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Value that can go up or down. Never drops below zero.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

const BUCKET_BOUNDS: [u64; 13] = [
    1, 5, 10, 25, 50, 100, 250, 500, 1_000, 5_000, 10_000, 30_000, 60_000,
];

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; BUCKET_BOUNDS.len()],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds. Values above the last bound land in it.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// `(upper_bound_ms, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the telemetry engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Dispatch
    pub events_received: Counter,
    pub decode_errors: Counter,
    pub projection_errors: Counter,
    pub unknown_kinds: Counter,
    pub records_projected: Counter,

    // Storage
    pub records_flushed: Counter,
    pub procedures_executed: Counter,
    pub flush_errors: Counter,

    // Partition consumer
    pub batches_processed: Counter,
    pub checkpoints_saved: Counter,
    pub checkpoint_errors: Counter,
    pub fetch_errors: Counter,
    pub partition_restarts: Counter,

    // Push subscriber
    pub mqtt_messages: Counter,
    pub mqtt_reconnects: Counter,

    // Scheduler
    pub scheduler_cycles: Counter,
    pub scheduler_failures: Counter,

    // Latency histograms
    pub flush_latency_ms: Histogram,
    pub batch_latency_ms: Histogram,
    pub scheduler_cycle_ms: Histogram,

    // Gauges
    pub active_partitions: Gauge,
    pub broker_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_received: u64,
    pub decode_errors: u64,
    pub projection_errors: u64,
    pub unknown_kinds: u64,
    pub records_projected: u64,
    pub records_flushed: u64,
    pub procedures_executed: u64,
    pub flush_errors: u64,
    pub batches_processed: u64,
    pub checkpoints_saved: u64,
    pub checkpoint_errors: u64,
    pub fetch_errors: u64,
    pub partition_restarts: u64,
    pub mqtt_messages: u64,
    pub mqtt_reconnects: u64,
    pub scheduler_cycles: u64,
    pub scheduler_failures: u64,
    pub flush_latency_mean_ms: f64,
    pub batch_latency_mean_ms: f64,
    pub scheduler_cycle_mean_ms: f64,
    pub active_partitions: u64,
    pub broker_connected: bool,
}

impl Metrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_received: self.events_received.get(),
            decode_errors: self.decode_errors.get(),
            projection_errors: self.projection_errors.get(),
            unknown_kinds: self.unknown_kinds.get(),
            records_projected: self.records_projected.get(),
            records_flushed: self.records_flushed.get(),
            procedures_executed: self.procedures_executed.get(),
            flush_errors: self.flush_errors.get(),
            batches_processed: self.batches_processed.get(),
            checkpoints_saved: self.checkpoints_saved.get(),
            checkpoint_errors: self.checkpoint_errors.get(),
            fetch_errors: self.fetch_errors.get(),
            partition_restarts: self.partition_restarts.get(),
            mqtt_messages: self.mqtt_messages.get(),
            mqtt_reconnects: self.mqtt_reconnects.get(),
            scheduler_cycles: self.scheduler_cycles.get(),
            scheduler_failures: self.scheduler_failures.get(),
            flush_latency_mean_ms: self.flush_latency_ms.mean(),
            batch_latency_mean_ms: self.batch_latency_ms.mean(),
            scheduler_cycle_mean_ms: self.scheduler_cycle_ms.mean(),
            active_partitions: self.active_partitions.get(),
            broker_connected: self.broker_connected.get() > 0,
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

pub fn metrics() -> &'static Metrics {
    &METRICS
}
