//! Server configuration: flags, environment and config file.

use super::{file_duration, load_file, non_empty, parse_duration};
use anyhow::{Context, Result};
use clap::Parser;
use ipnet::IpNet;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_STORE_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_STORE_FILE: &str = "/tmp/metrics-db.json";
const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Metrics server
#[derive(Parser, Debug, Default)]
#[command(name = "server", version, about, long_about = None)]
pub struct ServerArgs {
    /// HTTP listen address
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// RPC listen address; RPC is disabled when unset
    #[arg(short = 'g', long = "grpc-address", env = "GRPC_ADDRESS")]
    pub grpc_address: Option<String>,

    /// Snapshot interval; 0 writes after every mutation
    #[arg(short = 'i', long = "store-interval", env = "STORE_INTERVAL", value_parser = parse_duration)]
    pub store_interval: Option<Duration>,

    /// Snapshot file; empty disables the file backend
    #[arg(short = 'f', long = "store-file", env = "STORE_FILE")]
    pub store_file: Option<String>,

    /// Replay the snapshot file on start
    #[arg(short = 'r', long, env = "RESTORE")]
    pub restore: Option<bool>,

    /// Database DSN; selects the relational backend
    #[arg(short = 'd', long = "database-dsn", env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// Redis address; selects the key-value backend
    #[arg(long = "redis-address", env = "REDIS_ADDRESS")]
    pub redis_address: Option<String>,

    /// Shared signing secret
    #[arg(short = 'k', long, env = "KEY")]
    pub key: Option<String>,

    /// Private key (PEM) used to decrypt request bodies
    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    pub crypto_key: Option<String>,

    /// CIDR allowed to push metrics
    #[arg(short = 't', long = "trusted-subnet", env = "TRUSTED_SUBNET")]
    pub trusted_subnet: Option<String>,

    /// How often the server logs its own counters
    #[arg(long = "stats-interval", env = "STATS_INTERVAL", value_parser = parse_duration)]
    pub stats_interval: Option<Duration>,

    /// JSON config file
    #[arg(short = 'c', long, env = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// Config-file layer; durations are strings in the same formats as flags
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerFile {
    address: Option<String>,
    grpc_address: Option<String>,
    store_interval: Option<String>,
    store_file: Option<String>,
    restore: Option<bool>,
    database_dsn: Option<String>,
    redis_address: Option<String>,
    key: Option<String>,
    crypto_key: Option<String>,
    trusted_subnet: Option<String>,
    stats_interval: Option<String>,
}

/// Storage backend chosen once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Sql { dsn: String },
    KeyValue { address: String },
    File { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub grpc_address: Option<String>,
    pub store_interval: Duration,
    pub store_file: Option<PathBuf>,
    pub restore: bool,
    pub database_dsn: Option<String>,
    pub redis_address: Option<String>,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
    pub trusted_subnet: Option<IpNet>,
    pub stats_interval: Duration,
}

impl ServerConfig {
    /// Parse process arguments and environment, then resolve.
    pub fn load() -> Result<Self> {
        Self::from_args(ServerArgs::parse())
    }

    pub fn from_args(args: ServerArgs) -> Result<Self> {
        let file: ServerFile = load_file(args.config.as_deref())?;

        let store_interval = match args.store_interval {
            Some(d) => Some(d),
            None => file_duration(file.store_interval, "store_interval")?,
        };
        let stats_interval = match args.stats_interval {
            Some(d) => Some(d),
            None => file_duration(file.stats_interval, "stats_interval")?,
        };

        // An explicitly empty STORE_FILE disables the file backend.
        let store_file = match args.store_file.or(file.store_file) {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_STORE_FILE)),
        };

        let trusted_subnet = non_empty(args.trusted_subnet.or(file.trusted_subnet))
            .map(|cidr| {
                cidr.trim()
                    .parse::<IpNet>()
                    .with_context(|| format!("Invalid TRUSTED_SUBNET: {}", cidr))
            })
            .transpose()?;

        Ok(Self {
            address: non_empty(args.address.or(file.address))
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            grpc_address: non_empty(args.grpc_address.or(file.grpc_address)),
            store_interval: store_interval.unwrap_or(DEFAULT_STORE_INTERVAL),
            store_file,
            restore: args.restore.or(file.restore).unwrap_or(true),
            database_dsn: non_empty(args.database_dsn.or(file.database_dsn)),
            redis_address: non_empty(args.redis_address.or(file.redis_address)),
            key: non_empty(args.key.or(file.key)),
            crypto_key: non_empty(args.crypto_key.or(file.crypto_key)).map(PathBuf::from),
            trusted_subnet,
            stats_interval: stats_interval.unwrap_or(DEFAULT_STATS_INTERVAL),
        })
    }

    /// Snapshot after every mutation instead of on a timer
    pub fn sync_writes(&self) -> bool {
        self.store_interval.is_zero()
    }

    /// DSN, then redis, then snapshot file, then memory.
    pub fn backend(&self) -> BackendKind {
        if let Some(dsn) = &self.database_dsn {
            BackendKind::Sql { dsn: dsn.clone() }
        } else if let Some(address) = &self.redis_address {
            BackendKind::KeyValue {
                address: address.clone(),
            }
        } else if let Some(path) = &self.store_file {
            BackendKind::File { path: path.clone() }
        } else {
            BackendKind::Memory
        }
    }
}
