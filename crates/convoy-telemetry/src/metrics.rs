use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

/// In-memory counter. Monotonically increasing.
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// In-memory gauge. Can go up or down.
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }
    fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }
    fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }
    fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of every registered metric.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, i64>,
}

/// Named counters and gauges shared across the orchestrator. Metrics are
/// created on first use; reads never block writers for long.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    counters: RwLock<HashMap<String, Arc<Counter>>>,
    gauges: RwLock<HashMap<String, Arc<Gauge>>>,
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str, n: u64) {
        self.counter(name).increment(n);
    }

    pub fn counter_value(&self, name: &str) -> u64 {
        self.counter(name).get()
    }

    pub fn gauge_set(&self, name: &str, value: i64) {
        self.gauge(name).set(value);
    }

    pub fn gauge_add(&self, name: &str, delta: i64) {
        self.gauge(name).add(delta);
    }

    pub fn gauge_value(&self, name: &str) -> i64 {
        self.gauge(name).get()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .inner
            .counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect();
        let gauges = self
            .inner
            .gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect();
        MetricsSnapshot { counters, gauges }
    }

    fn counter(&self, name: &str) -> Arc<Counter> {
        if let Some(c) = self.inner.counters.read().get(name) {
            return Arc::clone(c);
        }
        let mut counters = self.inner.counters.write();
        Arc::clone(counters.entry(name.to_string()).or_default())
    }

    fn gauge(&self, name: &str) -> Arc<Gauge> {
        if let Some(g) = self.inner.gauges.read().get(name) {
            return Arc::clone(g);
        }
        let mut gauges = self.inner.gauges.write();
        Arc::clone(gauges.entry(name.to_string()).or_default())
    }
}
