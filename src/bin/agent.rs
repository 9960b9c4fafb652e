//! Metricflow Agent - samples host gauges and pushes them to the server
//!
//! # Usage
//! ```sh
//! ADDRESS=http://127.0.0.1:8080 POLL_INTERVAL=2s REPORT_INTERVAL=10s cargo run --bin agent
//! ```

use anyhow::Result;
use metricflow::application::system::agent::AgentApplication;
use metricflow::application::system::{Shutdown, Supervisor};
use metricflow::config::AgentConfig;
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

    info!("Metricflow Agent {} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load()?;
    let app = AgentApplication::build(config)?;

    let mut supervisor = Supervisor::new(Shutdown::new());
    app.start(&mut supervisor);

    supervisor.run_until_signal().await?;
    info!("Agent stopped.");

    Ok(())
}
