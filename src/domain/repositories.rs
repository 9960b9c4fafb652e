//! Storage Engine Abstraction
//!
//! This module defines the storage trait every metric backend implements,
//! keeping the gateway and supervisor independent of where metrics live.
//!
//! # Design
//!
//! `MetricStorage` applies the metric semantics:
//! - Gauge upsert overwrites the stored value
//! - Counter upsert adds the delta to the stored total (or creates it)
//!
//! Each backend picks its own concurrency discipline:
//! - `InMemoryStorage`: one async `RwLock` over both maps
//! - `FileSnapshotStorage`: in-memory plus a full JSON rewrite on `flush`
//! - `SqlStorage`: merge pushed into `INSERT ... ON CONFLICT`
//! - `KeyValueStorage`: read-add-write per key, counter merges can be lost
//!   under concurrent writers
//!
//! # Example
//!
//! ```rust,no_run
//! use metricflow::domain::metric::{Metric, MetricKind};
//! use metricflow::domain::repositories::MetricStorage;
//! use metricflow::infrastructure::repositories::InMemoryStorage;
//!
//! # async {
//! let storage = InMemoryStorage::new();
//! storage.upsert(&Metric::counter("hits", 5)).await?;
//! let hits = storage.find("hits", MetricKind::Counter).await?;
//! # Ok::<(), metricflow::domain::errors::MetricsError>(())
//! # };
//! ```

use crate::domain::errors::MetricsResult;
use crate::domain::metric::{Metric, MetricKind};
use async_trait::async_trait;

/// Persistent or in-process home of the server's metric set
#[async_trait]
pub trait MetricStorage: Send + Sync {
    /// Insert or merge a metric according to its kind
    async fn upsert(&self, metric: &Metric) -> MetricsResult<()>;

    /// Look up a metric; `NotFound` when absent
    async fn find(&self, id: &str, kind: MetricKind) -> MetricsResult<Metric>;

    /// Dump every stored metric, in no particular order
    async fn export_all(&self) -> MetricsResult<Vec<Metric>>;

    /// Apply each metric as an upsert; atomicity is backend-specific
    async fn import_batch(&self, metrics: &[Metric]) -> MetricsResult<()>;

    /// Liveness probe
    async fn ping(&self) -> MetricsResult<()>;

    /// Write any mirrored state to durable storage
    async fn flush(&self) -> MetricsResult<()> {
        Ok(())
    }

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
