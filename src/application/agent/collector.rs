//! Agent-side accumulator
//!
//! Gauges are overwritten by every sample; counters accumulate. `PollCount` is
//! incremented once per sample and never reset, so the server-side total keeps
//! growing across flushes.

use crate::domain::errors::MetricsResult;
use crate::domain::metric::{Metric, MetricValue};
use crate::infrastructure::host_metrics::GaugeSource;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

pub const POLL_COUNT: &str = "PollCount";

#[derive(Debug, Default)]
struct Accumulator {
    gauges: BTreeMap<String, f64>,
    counters: BTreeMap<String, i64>,
}

impl Accumulator {
    /// Restored values replace whatever the agent already holds.
    fn restore(&mut self, metric: &Metric) {
        match metric.value {
            MetricValue::Gauge(v) => {
                self.gauges.insert(metric.id.clone(), v);
            }
            MetricValue::Counter(d) => {
                self.counters.insert(metric.id.clone(), d);
            }
        }
    }
}

pub struct MetricsCollector {
    state: RwLock<Accumulator>,
    source: Mutex<Box<dyn GaugeSource>>,
}

impl MetricsCollector {
    pub fn new(source: Box<dyn GaugeSource>) -> Self {
        Self {
            state: RwLock::new(Accumulator::default()),
            source: Mutex::new(source),
        }
    }

    /// Read fresh gauges and bump `PollCount`.
    ///
    /// The source is read before the accumulator lock is taken.
    pub fn sample(&self) {
        let readings = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read();

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for (name, value) in readings {
            if !value.is_finite() {
                warn!(gauge = %name, value, "Dropping non-finite reading");
                continue;
            }
            state.gauges.insert(name, value);
        }
        let gauges = state.gauges.len();
        let polls = state.counters.entry(POLL_COUNT.to_string()).or_insert(0);
        *polls += 1;
        debug!(poll_count = *polls, gauges, "Sampled");
    }

    /// Copy of the current state; the lock is held only for the copy.
    pub fn snapshot(&self) -> Vec<Metric> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let gauges = state.gauges.iter().map(|(id, v)| Metric::gauge(id, *v));
        let counters = state.counters.iter().map(|(id, d)| Metric::counter(id, *d));
        gauges.chain(counters).collect()
    }

    pub fn export_all(&self) -> Vec<Metric> {
        self.snapshot()
    }

    /// Load a batch into the accumulator, overwriting gauges and counters alike.
    pub fn import_batch(&self, metrics: &[Metric]) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for metric in metrics {
            state.restore(metric);
        }
    }

    /// Parse a JSON array of wire metrics and load it; unknown types are rejected.
    pub fn import_json(&self, raw: &str) -> MetricsResult<()> {
        let metrics: Vec<Metric> = serde_json::from_str(raw)?;
        self.import_batch(&metrics);
        Ok(())
    }

    pub fn poll_count(&self) -> i64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.counters.get(POLL_COUNT).copied().unwrap_or(0)
    }
}
