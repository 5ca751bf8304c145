//! Metrics collection and exposition.
//!
//! Components never touch a global registry directly. They receive an
//! `Arc<dyn MetricsSink>` at construction and report through it:
//! - [`PrometheusSink`] forwards to the `metrics` facade, exported by
//!   `metrics-exporter-prometheus` when [`init_metrics`] has run
//! - [`RecordingSink`] keeps everything in memory (tests, diagnostics)
//!
//! # Keys
//! Keys are dotted strings derived from a configurable prefix
//! (see [`ProxyMetricKeys`]). The Prometheus exporter rewrites the dots
//! into underscores.

use std::net::SocketAddr;
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Destination for counters and timers.
pub trait MetricsSink: Send + Sync {
    /// Increment the counter `key` by one.
    fn increment(&self, key: &str);

    /// Record one observation of the timer `key`.
    fn record_duration(&self, key: &str, elapsed: Duration);
}

/// Sink backed by the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn increment(&self, key: &str) {
        counter!(key.to_owned()).increment(1);
    }

    fn record_duration(&self, key: &str, elapsed: Duration) {
        histogram!(key.to_owned()).record(elapsed.as_secs_f64());
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct RecordingSink {
    counters: DashMap<String, u64>,
    timers: DashMap<String, Vec<Duration>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 if never incremented).
    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }

    /// Number of observations recorded for a timer.
    pub fn timer_count(&self, key: &str) -> usize {
        self.timers.get(key).map(|v| v.len()).unwrap_or(0)
    }

    /// Copy of all counters, sorted by key.
    pub fn counters(&self) -> Vec<(String, u64)> {
        let mut all: Vec<_> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        all.sort();
        all
    }
}

impl MetricsSink for RecordingSink {
    fn increment(&self, key: &str) {
        *self.counters.entry(key.to_string()).or_insert(0) += 1;
    }

    fn record_duration(&self, key: &str, elapsed: Duration) {
        self.timers.entry(key.to_string()).or_default().push(elapsed);
    }
}

/// Metric keys reported by the token-info proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyMetricKeys {
    /// Full request timer.
    pub request: String,
    pub cache_hits: String,
    pub cache_expirations: String,
    pub cache_misses: String,
    /// Upstream-only timer.
    pub upstream: String,
    pub upstream_timeouts: String,
    pub upstream_overruns: String,
    pub upstream_open_requests: String,
    pub upstream_errors: String,
}

impl ProxyMetricKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            request: prefix.to_string(),
            cache_hits: format!("{}.cache.hits", prefix),
            cache_expirations: format!("{}.cache.expirations", prefix),
            cache_misses: format!("{}.cache.misses", prefix),
            upstream: format!("{}.upstream", prefix),
            upstream_timeouts: format!("{}.upstream.timeouts", prefix),
            upstream_overruns: format!("{}.upstream.overruns", prefix),
            upstream_open_requests: format!("{}.upstream.openrequests", prefix),
            upstream_errors: format!("{}.upstream.errors", prefix),
        }
    }
}

/// Revocation refresh counters.
pub mod revocation {
    pub const ACCEPTED: &str = "revocation.refresh.accepted";
    pub const REJECTED: &str = "revocation.refresh.rejected";
    pub const FAILURES: &str = "revocation.refresh.failures";
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
