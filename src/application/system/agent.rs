//! Agent composition root: one sampling loop, one flush loop.

use super::{Supervisor, run_periodic};
use crate::application::agent::{MetricsCollector, Transmitter};
use crate::config::AgentConfig;
use crate::domain::ports::MetricsSink;
use crate::infrastructure::core::net::advertised_ip;
use crate::infrastructure::crypto::MessageEncryptor;
use crate::infrastructure::host_metrics::{GaugeSource, HostGaugeSource};
use crate::infrastructure::transport::{HttpSink, RpcSink};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub struct AgentApplication {
    pub config: AgentConfig,
    pub collector: Arc<MetricsCollector>,
    pub transmitter: Arc<Transmitter>,
}

impl AgentApplication {
    pub fn build(config: AgentConfig) -> Result<Self> {
        Self::build_with_source(config, Box::new(HostGaugeSource::new()))
    }

    pub fn build_with_source(config: AgentConfig, source: Box<dyn GaugeSource>) -> Result<Self> {
        let real_ip = advertised_ip(config.real_ip.as_deref());
        info!("Advertising caller address {}", real_ip);

        let encryptor = match &config.crypto_key {
            Some(path) => {
                info!("Encrypting bodies with {}", path.display());
                Some(MessageEncryptor::load(path)?)
            }
            None => None,
        };

        let mut sinks: Vec<Box<dyn MetricsSink>> =
            vec![Box::new(HttpSink::new(&config.address, encryptor, real_ip.clone())?)];
        if let Some(address) = &config.grpc_address {
            sinks.push(Box::new(RpcSink::connect_lazy(address, &real_ip)?));
            info!("RPC transport enabled ({})", address);
        }

        let collector = Arc::new(MetricsCollector::new(source));
        let transmitter = Arc::new(Transmitter::new(collector.clone(), sinks, config.key.clone()));

        Ok(Self {
            config,
            collector,
            transmitter,
        })
    }

    pub fn start(self, supervisor: &mut Supervisor) {
        info!(
            "Agent reporting to {} (poll {:?}, report {:?})",
            self.config.address, self.config.poll_interval, self.config.report_interval
        );

        let collector = self.collector;
        let poll_interval = self.config.poll_interval;
        supervisor.spawn("sampler", move |signal| async move {
            run_periodic(poll_interval, signal, move || {
                collector.sample();
                std::future::ready(())
            })
            .await;
            Ok(())
        });

        let transmitter = self.transmitter;
        let report_interval = self.config.report_interval;
        supervisor.spawn("transmitter", move |signal| async move {
            run_periodic(report_interval, signal, move || {
                let transmitter = transmitter.clone();
                async move {
                    transmitter.flush().await;
                }
            })
            .await;
            Ok(())
        });
    }
}
