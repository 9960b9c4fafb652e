//! Prometheus metrics definitions for the gateway
//!
//! All metrics use the `metricflow_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

pub const TRANSPORTS: [&str; 2] = ["http", "rpc"];
pub const KINDS: [&str; 2] = ["gauge", "counter"];
pub const REJECT_REASONS: [&str; 4] = ["validation", "signature", "not_found", "storage"];

/// Counters describing the gateway's own traffic
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Arc<Registry>,
    /// Metrics written to storage, by transport and kind
    pub accepted_total: CounterVec,
    /// Requests refused, by transport and reason
    pub rejected_total: CounterVec,
    /// Backend failures, by backend name
    pub storage_errors_total: CounterVec,
    /// Entries currently held by the storage engine
    pub stored_metrics: GenericGauge<AtomicF64>,
    /// Uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
    /// Handler latency in seconds
    pub request_latency_seconds: HistogramVec,
}

impl GatewayMetrics {
    /// Create a new instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let accepted_total = CounterVec::new(
            Opts::new(
                "metricflow_accepted_total",
                "Metrics written to storage by transport and type",
            ),
            &["transport", "type"],
        )?;
        registry.register(Box::new(accepted_total.clone()))?;

        let rejected_total = CounterVec::new(
            Opts::new(
                "metricflow_rejected_total",
                "Rejected requests by transport and reason",
            ),
            &["transport", "reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let storage_errors_total = CounterVec::new(
            Opts::new(
                "metricflow_storage_errors_total",
                "Storage backend failures",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(storage_errors_total.clone()))?;

        let stored_metrics = Gauge::with_opts(Opts::new(
            "metricflow_stored_metrics",
            "Number of metrics held by the storage engine",
        ))?;
        registry.register(Box::new(stored_metrics.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "metricflow_uptime_seconds",
            "Server uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "metricflow_request_latency_seconds",
                "Gateway operation latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["transport", "operation"],
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            accepted_total,
            rejected_total,
            storage_errors_total,
            stored_metrics,
            uptime_seconds,
            request_latency_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_accepted(&self, transport: &str, kind: &str, count: usize) {
        self.accepted_total
            .with_label_values(&[transport, kind])
            .inc_by(count as f64);
    }

    pub fn inc_rejected(&self, transport: &str, reason: &str) {
        self.rejected_total
            .with_label_values(&[transport, reason])
            .inc();
    }

    pub fn inc_storage_error(&self, backend: &str) {
        self.storage_errors_total
            .with_label_values(&[backend])
            .inc();
    }

    pub fn observe_latency(&self, transport: &str, operation: &str, seconds: f64) {
        self.request_latency_seconds
            .with_label_values(&[transport, operation])
            .observe(seconds);
    }

    pub fn accepted(&self, transport: &str, kind: &str) -> f64 {
        self.accepted_total
            .with_label_values(&[transport, kind])
            .get()
    }

    pub fn rejected(&self, transport: &str, reason: &str) -> f64 {
        self.rejected_total
            .with_label_values(&[transport, reason])
            .get()
    }

    pub fn total_accepted(&self) -> f64 {
        TRANSPORTS
            .iter()
            .flat_map(|t| KINDS.iter().map(move |k| self.accepted(t, k)))
            .sum()
    }

    pub fn total_rejected(&self) -> f64 {
        TRANSPORTS
            .iter()
            .flat_map(|t| REJECT_REASONS.iter().map(move |r| self.rejected(t, r)))
            .sum()
    }
}
