use crate::domain::metric::Metric;
use anyhow::Result;
use async_trait::async_trait;

/// Outbound transport the agent pushes its accumulated metrics through
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn send_batch(&self, metrics: &[Metric]) -> Result<()>;

    /// Short transport name for logs
    fn name(&self) -> &'static str;
}
