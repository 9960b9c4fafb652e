//! Push-based metrics reporter for the server
//!
//! Periodically outputs the gateway's own counters as structured JSON to stdout.
//!
//! **Security**: This system only SENDS data, never accepts requests.

use crate::domain::metric::MetricKind;
use crate::domain::repositories::MetricStorage;
use crate::infrastructure::observability::metrics::GatewayMetrics;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub storage: StorageSnapshot,
    pub traffic: TrafficSnapshot,
}

#[derive(Serialize)]
pub struct StorageSnapshot {
    pub backend: String,
    pub gauges: usize,
    pub counters: usize,
}

#[derive(Serialize)]
pub struct TrafficSnapshot {
    pub accepted_total: f64,
    pub rejected_total: f64,
}

/// Push-based metrics reporter
///
/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections - only outbound data.
pub struct MetricsReporter {
    storage: Arc<dyn MetricStorage>,
    metrics: GatewayMetrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    /// Create a new metrics reporter
    ///
    /// # Arguments
    /// * `storage` - The storage engine being served
    /// * `metrics` - Gateway counters
    /// * `interval` - How often to output metrics
    pub fn new(storage: Arc<dyn MetricStorage>, metrics: GatewayMetrics, interval: Duration) -> Self {
        Self {
            storage,
            metrics,
            start_time: Instant::now(),
            interval,
        }
    }

    /// Report on every tick until `until` resolves
    pub async fn run(self, until: impl Future<Output = ()>) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        tokio::pin!(until);
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut until => {
                    info!("MetricsReporter: stopped");
                    return;
                }
                _ = ticker.tick() => self.report().await,
            }
        }
    }

    async fn report(&self) {
        match self.collect_snapshot().await {
            Ok(snapshot) => match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Use a special prefix so logs can be easily filtered
                    println!("METRICS_JSON:{}", json);
                    info!(
                        "Stored: {} gauges, {} counters | Accepted: {} | Rejected: {} | Uptime: {}s",
                        snapshot.storage.gauges,
                        snapshot.storage.counters,
                        snapshot.traffic.accepted_total,
                        snapshot.traffic.rejected_total,
                        snapshot.uptime_seconds
                    );
                }
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            },
            Err(e) => warn!("Failed to collect metrics: {}", e),
        }
    }

    /// Collect current metrics snapshot
    async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let stored = self.storage.export_all().await?;
        let uptime = self.start_time.elapsed().as_secs();

        let gauges = stored
            .iter()
            .filter(|m| m.kind() == MetricKind::Gauge)
            .count();
        let counters = stored.len() - gauges;

        self.metrics.stored_metrics.set(stored.len() as f64);
        self.metrics.uptime_seconds.set(uptime as f64);

        Ok(MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageSnapshot {
                backend: self.storage.backend().to_string(),
                gauges,
                counters,
            },
            traffic: TrafficSnapshot {
                accepted_total: self.metrics.total_accepted(),
                rejected_total: self.metrics.total_rejected(),
            },
        })
    }
}
