//! Agent configuration: flags, environment and config file.

use super::{file_duration, load_file, non_empty, parse_duration};
use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8080";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Metrics collection agent
#[derive(Parser, Debug, Default)]
#[command(name = "agent", version, about, long_about = None)]
pub struct AgentArgs {
    /// Server HTTP address
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// Server RPC address; also push over RPC when set
    #[arg(short = 'g', long = "grpc-address", env = "GRPC_ADDRESS")]
    pub grpc_address: Option<String>,

    /// Sampling interval
    #[arg(short = 'p', long = "poll-interval", env = "POLL_INTERVAL", value_parser = parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Transmission interval
    #[arg(short = 'r', long = "report-interval", env = "REPORT_INTERVAL", value_parser = parse_duration)]
    pub report_interval: Option<Duration>,

    /// Shared signing secret
    #[arg(short = 'k', long, env = "KEY")]
    pub key: Option<String>,

    /// Server public key (PEM) used to encrypt request bodies
    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    pub crypto_key: Option<String>,

    /// Address advertised in X-Real-IP; detected when unset
    #[arg(long = "real-ip", env = "REAL_IP")]
    pub real_ip: Option<String>,

    /// JSON config file
    #[arg(short = 'c', long, env = "CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentFile {
    address: Option<String>,
    grpc_address: Option<String>,
    poll_interval: Option<String>,
    report_interval: Option<String>,
    key: Option<String>,
    crypto_key: Option<String>,
    real_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL including scheme
    pub address: String,
    pub grpc_address: Option<String>,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
    pub real_ip: Option<String>,
}

impl AgentConfig {
    /// Parse process arguments and environment, then resolve.
    pub fn load() -> Result<Self> {
        Self::from_args(AgentArgs::parse())
    }

    pub fn from_args(args: AgentArgs) -> Result<Self> {
        let file: AgentFile = load_file(args.config.as_deref())?;

        let poll_interval = match args.poll_interval {
            Some(d) => Some(d),
            None => file_duration(file.poll_interval, "poll_interval")?,
        };
        let report_interval = match args.report_interval {
            Some(d) => Some(d),
            None => file_duration(file.report_interval, "report_interval")?,
        };
        let poll_interval = poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        let report_interval = report_interval.unwrap_or(DEFAULT_REPORT_INTERVAL);
        if poll_interval.is_zero() || report_interval.is_zero() {
            anyhow::bail!("POLL_INTERVAL and REPORT_INTERVAL must be positive");
        }

        let address = non_empty(args.address.or(file.address))
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        Ok(Self {
            address: with_scheme(&address),
            grpc_address: non_empty(args.grpc_address.or(file.grpc_address)).map(|a| with_scheme(&a)),
            poll_interval,
            report_interval,
            key: non_empty(args.key.or(file.key)),
            crypto_key: non_empty(args.crypto_key.or(file.crypto_key)).map(PathBuf::from),
            real_ip: non_empty(args.real_ip.or(file.real_ip)),
        })
    }
}

/// `localhost:8080` → `http://localhost:8080`
fn with_scheme(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_added_once() {
        assert_eq!(with_scheme("localhost:8080"), "http://localhost:8080");
        assert_eq!(with_scheme("https://metrics:443/"), "https://metrics:443");
    }
}
