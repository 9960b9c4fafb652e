//! In-Memory Storage Implementation
//!
//! Thread-safe, in-memory implementation of [`MetricStorage`].
//!
//! # Features
//!
//! - **Atomic merges**: counter read and write happen under one write lock
//! - **Async**: All operations are async-ready
//! - **Testing**: Ideal for unit tests and development
//!
//! # Limitations
//!
//! - Data is lost on process exit (see `FileSnapshotStorage` for a mirror)
//! - `import_batch` is not atomic: a failing entry leaves earlier ones applied

use crate::domain::errors::MetricsResult;
use crate::domain::errors::MetricsError;
use crate::domain::metric::{Metric, MetricKind, MetricValue};
use crate::domain::repositories::MetricStorage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// In-memory implementation of MetricStorage
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `(id, kind)` is already stored
    pub async fn contains(&self, id: &str, kind: MetricKind) -> bool {
        let tables = self.tables.read().await;
        match kind {
            MetricKind::Gauge => tables.gauges.contains_key(id),
            MetricKind::Counter => tables.counters.contains_key(id),
        }
    }

    pub async fn len(&self) -> usize {
        let tables = self.tables.read().await;
        tables.gauges.len() + tables.counters.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MetricStorage for InMemoryStorage {
    async fn upsert(&self, metric: &Metric) -> MetricsResult<()> {
        let mut tables = self.tables.write().await;
        match metric.value {
            MetricValue::Gauge(v) => {
                tables.gauges.insert(metric.id.clone(), v);
            }
            MetricValue::Counter(d) => {
                let total = tables.counters.entry(metric.id.clone()).or_insert(0);
                *total = total.checked_add(d).ok_or_else(|| {
                    MetricsError::validation(format!("counter {} overflows", metric.id))
                })?;
            }
        }
        Ok(())
    }

    async fn find(&self, id: &str, kind: MetricKind) -> MetricsResult<Metric> {
        let tables = self.tables.read().await;
        let found = match kind {
            MetricKind::Gauge => tables.gauges.get(id).map(|v| Metric::gauge(id, *v)),
            MetricKind::Counter => tables.counters.get(id).map(|d| Metric::counter(id, *d)),
        };
        found.ok_or_else(|| MetricsError::not_found(id, kind))
    }

    async fn export_all(&self) -> MetricsResult<Vec<Metric>> {
        let tables = self.tables.read().await;
        let gauges = tables.gauges.iter().map(|(id, v)| Metric::gauge(id, *v));
        let counters = tables.counters.iter().map(|(id, d)| Metric::counter(id, *d));
        Ok(gauges.chain(counters).collect())
    }

    async fn import_batch(&self, metrics: &[Metric]) -> MetricsResult<()> {
        for metric in metrics {
            self.upsert(metric).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> MetricsResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
