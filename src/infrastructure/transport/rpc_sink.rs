use crate::domain::metric::Metric;
use crate::domain::ports::MetricsSink;
use crate::infrastructure::core::http_client_factory::AGENT_REQUEST_TIMEOUT;
use crate::infrastructure::core::net::REAL_IP_HEADER;
use crate::infrastructure::rpc::metrics_client::MetricsClient;
use crate::infrastructure::rpc::{MetricProto, SetMetricsRequest};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

/// Pushes the whole batch with one `SetMetrics` call.
pub struct RpcSink {
    client: MetricsClient<Channel>,
    address: String,
    real_ip: MetadataValue<Ascii>,
}

impl RpcSink {
    /// The channel connects on first use, so a server that is not up yet only
    /// fails individual flushes.
    pub fn connect_lazy(address: &str, real_ip: &str) -> Result<Self> {
        let address = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let endpoint = Endpoint::from_shared(address.clone())
            .with_context(|| format!("Invalid RPC address {}", address))?
            .timeout(AGENT_REQUEST_TIMEOUT)
            .connect_timeout(AGENT_REQUEST_TIMEOUT);
        let real_ip: MetadataValue<Ascii> = real_ip
            .parse()
            .with_context(|| format!("Invalid advertised address {}", real_ip))?;

        Ok(Self {
            client: MetricsClient::new(endpoint.connect_lazy()),
            address,
            real_ip,
        })
    }
}

#[async_trait]
impl MetricsSink for RpcSink {
    async fn send_batch(&self, metrics: &[Metric]) -> Result<()> {
        let mut request = tonic::Request::new(SetMetricsRequest {
            metrics: metrics.iter().cloned().map(MetricProto::from).collect(),
        });
        request
            .metadata_mut()
            .insert(REAL_IP_HEADER, self.real_ip.clone());

        let response = self
            .client
            .clone()
            .set_metrics(request)
            .await
            .map_err(|status| {
                anyhow!(
                    "SetMetrics to {} failed: {:?} {}",
                    self.address,
                    status.code(),
                    status.message()
                )
            })?;
        debug!(answer = %response.get_ref().answer, "SetMetrics acknowledged");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rpc"
    }
}
