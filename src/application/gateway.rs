//! Validation pipeline shared by the HTTP and RPC transports
//!
//! Every mutating call runs: verify signature (when a key is configured),
//! upsert, then read back so the caller sees the post-merge value. A batch is
//! verified in full before anything is written.

use crate::domain::errors::{MetricsError, MetricsResult};
use crate::domain::metric::{Metric, MetricKind};
use crate::domain::repositories::MetricStorage;
use crate::infrastructure::observability::GatewayMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Deadline for the storage liveness probe
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Rpc,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Rpc => "rpc",
        }
    }
}

#[derive(Clone)]
pub struct MetricGateway {
    storage: Arc<dyn MetricStorage>,
    key: Option<Arc<str>>,
    metrics: GatewayMetrics,
    transport: Transport,
}

impl MetricGateway {
    pub fn new(storage: Arc<dyn MetricStorage>, key: Option<String>, metrics: GatewayMetrics) -> Self {
        Self {
            storage,
            key: key.map(Arc::from),
            metrics,
            transport: Transport::Http,
        }
    }

    /// Same gateway, counted under another transport label
    pub fn via(&self, transport: Transport) -> Self {
        Self {
            transport,
            ..self.clone()
        }
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn storage(&self) -> &Arc<dyn MetricStorage> {
        &self.storage
    }

    fn verify(&self, metric: &Metric) -> MetricsResult<()> {
        match self.key.as_deref() {
            Some(key) if !metric.is_authentic(key) => Err(MetricsError::Signature {
                id: metric.id.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn stamp(&self, mut metric: Metric) -> Metric {
        match self.key.as_deref() {
            Some(key) => metric.sign(key),
            None => metric.hash = None,
        }
        metric
    }

    fn observe<T>(&self, operation: &str, started: Instant, result: MetricsResult<T>) -> MetricsResult<T> {
        let transport = self.transport.as_str();
        self.metrics
            .observe_latency(transport, operation, started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            let reason = match e {
                MetricsError::Validation { .. } => "validation",
                MetricsError::Signature { .. } => "signature",
                MetricsError::NotFound { .. } => "not_found",
                MetricsError::Storage { .. } | MetricsError::Connect { .. } => {
                    self.metrics.inc_storage_error(self.storage.backend());
                    warn!(operation, transport, error = %e, "Storage failure");
                    "storage"
                }
            };
            self.metrics.inc_rejected(transport, reason);
            debug!(operation, transport, reason, error = %e, "Request rejected");
        }
        result
    }

    fn count_accepted(&self, metrics: &[Metric]) {
        let gauges = metrics
            .iter()
            .filter(|m| m.kind() == MetricKind::Gauge)
            .count();
        let transport = self.transport.as_str();
        self.metrics
            .inc_accepted(transport, MetricKind::Gauge.as_str(), gauges);
        self.metrics
            .inc_accepted(transport, MetricKind::Counter.as_str(), metrics.len() - gauges);
    }

    /// Verify, upsert and return the stored metric after the merge.
    pub async fn update(&self, metric: Metric) -> MetricsResult<Metric> {
        let started = Instant::now();
        let result: MetricsResult<Metric> = async {
            self.verify(&metric)?;
            self.storage.upsert(&metric).await?;
            self.count_accepted(std::slice::from_ref(&metric));
            let stored = self.storage.find(&metric.id, metric.kind()).await?;
            Ok(self.stamp(stored))
        }
        .await;
        self.observe("update", started, result)
    }

    /// Verify every entry, then import the batch in one call.
    pub async fn update_batch(&self, metrics: Vec<Metric>) -> MetricsResult<()> {
        let started = Instant::now();
        let result: MetricsResult<()> = async {
            for metric in &metrics {
                self.verify(metric)?;
            }
            self.storage.import_batch(&metrics).await?;
            self.count_accepted(&metrics);
            Ok(())
        }
        .await;
        self.observe("update_batch", started, result)
    }

    /// Positional update; responds with the post-merge value as text.
    ///
    /// The positional form carries no hash and is not signature-checked.
    pub async fn update_legacy(&self, kind: MetricKind, name: &str, raw: &str) -> MetricsResult<String> {
        let started = Instant::now();
        let result: MetricsResult<String> = async {
            let metric = Metric::parse_legacy(kind, name, raw)?;
            self.storage.upsert(&metric).await?;
            self.count_accepted(std::slice::from_ref(&metric));
            let stored = self.storage.find(&metric.id, kind).await?;
            Ok(stored.value.render())
        }
        .await;
        self.observe("update_legacy", started, result)
    }

    pub async fn find(&self, id: &str, kind: MetricKind) -> MetricsResult<Metric> {
        let started = Instant::now();
        let result = self
            .storage
            .find(id, kind)
            .await
            .map(|metric| self.stamp(metric));
        self.observe("find", started, result)
    }

    /// Look up several metrics; the first miss fails the call.
    pub async fn find_many(&self, queries: &[(String, MetricKind)]) -> MetricsResult<Vec<Metric>> {
        let mut found = Vec::with_capacity(queries.len());
        for (id, kind) in queries {
            found.push(self.find(id, *kind).await?);
        }
        Ok(found)
    }

    /// Every stored metric, sorted by kind then name.
    pub async fn find_all(&self) -> MetricsResult<Vec<Metric>> {
        let started = Instant::now();
        let result = self.storage.export_all().await.map(|mut all| {
            all.sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.id.cmp(&b.id)));
            all.into_iter().map(|m| self.stamp(m)).collect::<Vec<_>>()
        });
        self.observe("find_all", started, result)
    }

    pub async fn ping(&self) -> MetricsResult<()> {
        match tokio::time::timeout(PING_TIMEOUT, self.storage.ping()).await {
            Ok(result) => result,
            Err(_) => Err(MetricsError::storage(format!(
                "{} ping timed out after {:?}",
                self.storage.backend(),
                PING_TIMEOUT
            ))),
        }
    }
}
