//! Server composition root
//!
//! [`ServerApplication::build`] picks the storage backend, loads keys and wires
//! the gateway. [`ServerApplication::start`] binds the listeners and hands every
//! long-running duty to a [`Supervisor`].

use super::{Supervisor, run_periodic};
use crate::application::gateway::MetricGateway;
use crate::config::{BackendKind, ServerConfig};
use crate::domain::repositories::MetricStorage;
use crate::infrastructure::core::RetryPolicy;
use crate::infrastructure::crypto::MessageDecryptor;
use crate::infrastructure::observability::{GatewayMetrics, MetricsReporter};
use crate::infrastructure::persistence::Database;
use crate::infrastructure::repositories::key_value::RedisKeyValueStore;
use crate::infrastructure::{FileSnapshotStorage, InMemoryStorage, KeyValueStorage, SqlStorage};
use crate::interfaces;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::transport::server::TcpIncoming;
use tracing::{error, info};

/// Addresses the listeners actually bound to
#[derive(Debug, Clone, Copy)]
pub struct ServerHandle {
    pub http_addr: SocketAddr,
    pub grpc_addr: Option<SocketAddr>,
}

pub struct ServerApplication {
    pub config: ServerConfig,
    pub storage: Arc<dyn MetricStorage>,
    pub gateway: MetricGateway,
    decryptor: Option<MessageDecryptor>,
}

impl ServerApplication {
    pub async fn build(config: ServerConfig) -> Result<Self> {
        // 1. Storage backend, chosen once
        let storage = open_storage(&config).await?;
        info!("Storage backend: {}", storage.backend());

        // 2. Keys
        let decryptor = match &config.crypto_key {
            Some(path) => {
                let decryptor = MessageDecryptor::load(path)?;
                info!("Request body decryption enabled ({})", path.display());
                Some(decryptor)
            }
            None => None,
        };
        if config.key.is_some() {
            info!("Signature verification enabled");
        }
        if let Some(subnet) = &config.trusted_subnet {
            info!("Trusted subnet: {}", subnet);
        }

        // 3. Gateway shared by both transports
        let metrics = GatewayMetrics::new().context("Failed to register gateway metrics")?;
        let gateway = MetricGateway::new(storage.clone(), config.key.clone(), metrics);

        Ok(Self {
            config,
            storage,
            gateway,
            decryptor,
        })
    }

    /// Bind listeners and spawn every task; returns once all are running.
    pub async fn start(self, supervisor: &mut Supervisor) -> Result<ServerHandle> {
        let Self {
            config,
            storage,
            gateway,
            decryptor,
        } = self;

        // HTTP
        let listener = TcpListener::bind(&config.address)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {}", config.address))?;
        let http_addr = listener.local_addr()?;
        let app = interfaces::http::router(gateway.clone(), decryptor, config.trusted_subnet);
        info!("HTTP listening on {}", http_addr);
        supervisor.spawn("http", move |signal| async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(signal.wait())
                .await
                .context("HTTP server failed")
        });

        // RPC
        let grpc_addr = match &config.grpc_address {
            Some(address) => {
                let listener = TcpListener::bind(address)
                    .await
                    .with_context(|| format!("Failed to bind RPC listener on {}", address))?;
                let bound = listener.local_addr()?;
                let incoming = TcpIncoming::from_listener(listener, true, None)
                    .map_err(|e| anyhow::anyhow!("RPC listener setup failed: {}", e))?;
                let service = interfaces::rpc::service(gateway.clone(), config.trusted_subnet);
                info!("RPC listening on {}", bound);
                supervisor.spawn("rpc", move |signal| async move {
                    Server::builder()
                        .add_service(service)
                        .serve_with_incoming_shutdown(incoming, signal.wait())
                        .await
                        .context("RPC server failed")
                });
                Some(bound)
            }
            None => None,
        };

        // Snapshot ticker; with sync writes every mutation already flushes.
        if matches!(config.backend(), BackendKind::File { .. }) {
            let period = config.store_interval;
            let storage = storage.clone();
            supervisor.spawn("snapshot", move |signal| async move {
                if !period.is_zero() {
                    let ticking = storage.clone();
                    run_periodic(period, signal, move || {
                        let storage = ticking.clone();
                        async move {
                            if let Err(e) = storage.flush().await {
                                error!("Snapshot failed: {}", e);
                            }
                        }
                    })
                    .await;
                } else {
                    signal.wait().await;
                }
                storage.flush().await.context("Final snapshot failed")?;
                info!("Final snapshot written");
                Ok(())
            });
        }

        // Internal telemetry
        if !config.stats_interval.is_zero() {
            let reporter = MetricsReporter::new(storage, gateway.metrics().clone(), config.stats_interval);
            supervisor.spawn("reporter", move |signal| async move {
                reporter.run(signal.wait()).await;
                Ok(())
            });
        }

        Ok(ServerHandle {
            http_addr,
            grpc_addr,
        })
    }
}

async fn open_storage(config: &ServerConfig) -> Result<Arc<dyn MetricStorage>> {
    let storage: Arc<dyn MetricStorage> = match config.backend() {
        BackendKind::Sql { dsn } => {
            let db = Database::connect(&dsn, RetryPolicy::default())
                .await
                .context("Failed to initialize database")?;
            Arc::new(SqlStorage::new(db.pool))
        }
        BackendKind::KeyValue { address } => {
            let store = RedisKeyValueStore::connect(&address, RetryPolicy::default())
                .await
                .context("Failed to connect to key-value store")?;
            Arc::new(KeyValueStorage::new(store))
        }
        BackendKind::File { path } => Arc::new(
            FileSnapshotStorage::open(&path, config.restore, config.sync_writes())
                .await
                .with_context(|| format!("Failed to open snapshot file {}", path.display()))?,
        ),
        BackendKind::Memory => Arc::new(InMemoryStorage::new()),
    };
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::system::Shutdown;
    use crate::config::ServerArgs;
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> ServerConfig {
        ServerConfig::from_args(ServerArgs {
            address: Some("127.0.0.1:0".to_string()),
            store_file: Some(dir.join("metrics.json").display().to_string()),
            store_interval: Some(Duration::from_secs(3600)),
            stats_interval: Some(Duration::ZERO),
            ..ServerArgs::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_final_snapshot_written_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let app = ServerApplication::build(config.clone()).await.unwrap();
        let gateway = app.gateway.clone();
        let shutdown = Shutdown::new();
        let mut supervisor = Supervisor::new(shutdown.clone());
        let handle = app.start(&mut supervisor).await.unwrap();
        assert_ne!(handle.http_addr.port(), 0);

        gateway
            .update(crate::domain::metric::Metric::counter("hits", 4))
            .await
            .unwrap();
        shutdown.trigger();
        supervisor.wait().await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("metrics.json")).unwrap();
        assert!(raw.contains("\"hits\""));
    }
}
