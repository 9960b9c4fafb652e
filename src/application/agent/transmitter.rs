use super::collector::MetricsCollector;
use crate::domain::ports::MetricsSink;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one flush, per sink
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub metrics: usize,
    pub delivered: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

/// Pushes collector snapshots through every configured sink.
///
/// Delivery is best effort: a failed send is logged and the next tick carries
/// the then-current state. Nothing is retried or queued.
pub struct Transmitter {
    collector: Arc<MetricsCollector>,
    sinks: Vec<Box<dyn MetricsSink>>,
    key: Option<String>,
}

impl Transmitter {
    pub fn new(collector: Arc<MetricsCollector>, sinks: Vec<Box<dyn MetricsSink>>, key: Option<String>) -> Self {
        Self {
            collector,
            sinks,
            key,
        }
    }

    pub async fn flush(&self) -> FlushReport {
        let mut metrics = self.collector.snapshot();
        let mut report = FlushReport {
            metrics: metrics.len(),
            ..FlushReport::default()
        };
        if metrics.is_empty() {
            debug!("Nothing to flush yet");
            return report;
        }

        if let Some(key) = &self.key {
            for metric in &mut metrics {
                metric.sign(key);
            }
        }

        for sink in &self.sinks {
            match sink.send_batch(&metrics).await {
                Ok(()) => {
                    debug!(sink = sink.name(), count = metrics.len(), "Flushed");
                    report.delivered.push(sink.name());
                }
                Err(e) => {
                    error!(sink = sink.name(), error = %e, "Flush failed, dropping this cycle");
                    report.failed.push(sink.name());
                }
            }
        }

        if report.failed.is_empty() {
            info!("Flushed {} metrics via {:?}", report.metrics, report.delivered);
        }
        report
    }
}
