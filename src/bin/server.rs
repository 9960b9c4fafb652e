//! Metricflow Server - receives pushed metrics over HTTP and RPC
//!
//! # Usage
//! ```sh
//! ADDRESS=0.0.0.0:8080 STORE_INTERVAL=30s cargo run --bin server
//! cargo run --bin server -- -a 0.0.0.0:8080 -g 0.0.0.0:3200 -d metrics.db
//! ```
//!
//! Storage backend: `DATABASE_DSN`, then `REDIS_ADDRESS`, then `STORE_FILE`,
//! then memory. Telemetry is pushed as `METRICS_JSON:` lines every
//! `STATS_INTERVAL`.

use anyhow::Result;
use metricflow::application::system::server::ServerApplication;
use metricflow::application::system::{Shutdown, Supervisor};
use metricflow::config::ServerConfig;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Metricflow Server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load()?;
    info!(
        "Configuration loaded: address={}, grpc={:?}, backend={:?}",
        config.address,
        config.grpc_address,
        config.backend()
    );

    let app = ServerApplication::build(config).await?;

    let mut supervisor = Supervisor::new(Shutdown::new());
    let handle = app.start(&mut supervisor).await?;
    info!("Server running on {}. Press Ctrl+C to shutdown.", handle.http_addr);

    supervisor.run_until_signal().await?;
    info!("Server stopped.");

    Ok(())
}
