//! Key-value storage
//!
//! Every `(id, kind)` pair is stored under its own key, `metric:{type}:{id}`,
//! holding the metric's JSON wire form.
//!
//! # Limitations
//!
//! Counter upserts are read, add, write with no lock or transaction around
//! them. Two writers incrementing the same counter concurrently can both read
//! the old total and one increment is lost. Gauge overwrites are unaffected.

use crate::domain::errors::{MetricsError, MetricsResult};
use crate::domain::metric::{Metric, MetricKind, MetricValue};
use crate::domain::repositories::MetricStorage;
use crate::infrastructure::core::retry::RetryPolicy;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

const KEY_PREFIX: &str = "metric:";

/// Minimal string store the key-value backend runs on
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> MetricsResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> MetricsResult<()>;
    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> MetricsResult<Vec<String>>;
    async fn ping(&self) -> MetricsResult<()>;
}

/// Redis-backed store over one multiplexed connection
#[derive(Clone)]
pub struct RedisKeyValueStore {
    conn: MultiplexedConnection,
}

impl RedisKeyValueStore {
    pub async fn connect(address: &str, retry: RetryPolicy) -> MetricsResult<Self> {
        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("redis://{}", address)
        };
        let client = redis::Client::open(url.as_str())?;

        let conn = retry
            .connect(&url, || client.get_multiplexed_async_connection())
            .await?;
        info!("Connected to redis: {}", url);

        let store = Self { conn };
        store.ping().await?;
        Ok(store)
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> MetricsResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> MetricsResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> MetricsResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
        Ok(keys)
    }

    async fn ping(&self) -> MetricsResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Process-local store; `latency` is slept before every call
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    latency: Option<Duration>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> MetricsResult<Option<String>> {
        self.delay().await;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> MetricsResult<()> {
        self.delay().await;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> MetricsResult<Vec<String>> {
        self.delay().await;
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> MetricsResult<()> {
        Ok(())
    }
}

pub struct KeyValueStorage<S> {
    store: S,
}

impl<S: KeyValueStore> KeyValueStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key(id: &str, kind: MetricKind) -> String {
        format!("{}{}:{}", KEY_PREFIX, kind, id)
    }

    fn decode(key: &str, raw: &str) -> MetricsResult<Metric> {
        serde_json::from_str(raw)
            .map_err(|e| MetricsError::storage(format!("corrupt entry {}: {}", key, e)))
    }

    async fn write(&self, metric: Metric) -> MetricsResult<()> {
        let key = Self::key(&metric.id, metric.kind());
        let raw = serde_json::to_string(&metric)
            .map_err(|e| MetricsError::storage(format!("encoding {} failed: {}", key, e)))?;
        self.store.set(&key, raw).await
    }
}

#[async_trait]
impl<S: KeyValueStore> MetricStorage for KeyValueStorage<S> {
    async fn upsert(&self, metric: &Metric) -> MetricsResult<()> {
        match metric.value {
            MetricValue::Gauge(v) => self.write(Metric::gauge(&metric.id, v)).await,
            MetricValue::Counter(delta) => {
                let previous = match self.find(&metric.id, MetricKind::Counter).await {
                    Ok(stored) => match stored.value {
                        MetricValue::Counter(total) => total,
                        MetricValue::Gauge(_) => 0,
                    },
                    Err(e) if e.is_not_found() => 0,
                    Err(e) => return Err(e),
                };
                let total = previous.checked_add(delta).ok_or_else(|| {
                    MetricsError::validation(format!("counter {} overflows", metric.id))
                })?;
                self.write(Metric::counter(&metric.id, total)).await
            }
        }
    }

    async fn find(&self, id: &str, kind: MetricKind) -> MetricsResult<Metric> {
        let key = Self::key(id, kind);
        match self.store.get(&key).await? {
            Some(raw) => Self::decode(&key, &raw),
            None => Err(MetricsError::not_found(id, kind)),
        }
    }

    async fn export_all(&self) -> MetricsResult<Vec<Metric>> {
        let mut metrics = Vec::new();
        for key in self.store.keys(KEY_PREFIX).await? {
            // Keys can vanish between listing and reading.
            if let Some(raw) = self.store.get(&key).await? {
                metrics.push(Self::decode(&key, &raw)?);
            }
        }
        Ok(metrics)
    }

    async fn import_batch(&self, metrics: &[Metric]) -> MetricsResult<()> {
        for metric in metrics {
            self.upsert(metric).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> MetricsResult<()> {
        self.store.ping().await
    }

    fn backend(&self) -> &'static str {
        "kv"
    }
}
