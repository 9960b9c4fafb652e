use crate::config::{AgentArgs, AgentConfig, BackendKind, ServerArgs, ServerConfig};
use clap::Parser;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

// Global lock to prevent race conditions when modifying environment variables in tests
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn get_env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

const SERVER_VARS: [&str; 11] = [
    "ADDRESS",
    "GRPC_ADDRESS",
    "STORE_INTERVAL",
    "STORE_FILE",
    "RESTORE",
    "DATABASE_DSN",
    "REDIS_ADDRESS",
    "KEY",
    "CRYPTO_KEY",
    "TRUSTED_SUBNET",
    "CONFIG",
];

fn clear_env() {
    for var in SERVER_VARS
        .iter()
        .chain(["POLL_INTERVAL", "REPORT_INTERVAL", "REAL_IP", "STATS_INTERVAL"].iter())
    {
        unsafe { env::remove_var(var) };
    }
}

fn config_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_server_defaults() {
    let config = ServerConfig::from_args(ServerArgs::default()).unwrap();

    assert_eq!(config.address, "127.0.0.1:8080");
    assert_eq!(config.store_interval, Duration::from_secs(300));
    assert_eq!(config.store_file, Some(PathBuf::from("/tmp/metrics-db.json")));
    assert!(config.restore);
    assert!(config.key.is_none());
    assert!(config.trusted_subnet.is_none());
    assert_eq!(
        config.backend(),
        BackendKind::File {
            path: PathBuf::from("/tmp/metrics-db.json")
        }
    );
}

#[test]
fn test_backend_precedence() {
    let config = ServerConfig::from_args(ServerArgs {
        database_dsn: Some("sqlite://metrics.db".to_string()),
        redis_address: Some("localhost:6379".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(config.backend(), BackendKind::Sql { .. }));

    let config = ServerConfig::from_args(ServerArgs {
        redis_address: Some("localhost:6379".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(config.backend(), BackendKind::KeyValue { .. }));

    let config = ServerConfig::from_args(ServerArgs {
        store_file: Some(String::new()),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(config.backend(), BackendKind::Memory);
}

#[test]
fn test_zero_store_interval_means_sync_writes() {
    let config = ServerConfig::from_args(ServerArgs {
        store_interval: Some(Duration::ZERO),
        ..Default::default()
    })
    .unwrap();
    assert!(config.sync_writes());
}

#[test]
fn test_invalid_subnet_is_rejected() {
    let result = ServerConfig::from_args(ServerArgs {
        trusted_subnet: Some("10.0.0.0/99".to_string()),
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_flags_override_config_file() {
    let file = config_file(
        r#"{"address":"0.0.0.0:9000","store_interval":"1s","restore":false,"key":"from-file"}"#,
    );

    let config = ServerConfig::from_args(ServerArgs {
        key: Some("from-flag".to_string()),
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(config.address, "0.0.0.0:9000");
    assert_eq!(config.store_interval, Duration::from_secs(1));
    assert!(!config.restore);
    assert_eq!(config.key.as_deref(), Some("from-flag"));
}

#[test]
fn test_malformed_config_file_fails() {
    let file = config_file("{\"address\":");
    let result = ServerConfig::from_args(ServerArgs {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_server_env_vars() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();
    unsafe {
        env::set_var("ADDRESS", "0.0.0.0:8081");
        env::set_var("STORE_INTERVAL", "0");
        env::set_var("RESTORE", "false");
        env::set_var("TRUSTED_SUBNET", "192.168.1.0/24");
    }

    let args = ServerArgs::try_parse_from(["server"]).unwrap();
    let config = ServerConfig::from_args(args).unwrap();

    assert_eq!(config.address, "0.0.0.0:8081");
    assert!(config.sync_writes());
    assert!(!config.restore);
    assert_eq!(
        config.trusted_subnet.map(|n| n.to_string()).as_deref(),
        Some("192.168.1.0/24")
    );

    // Cleanup
    clear_env();
}

#[test]
fn test_flag_beats_env_var() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();
    unsafe { env::set_var("KEY", "from-env") };

    let args = ServerArgs::try_parse_from(["server", "-k", "from-flag"]).unwrap();
    let config = ServerConfig::from_args(args).unwrap();
    assert_eq!(config.key.as_deref(), Some("from-flag"));

    clear_env();
}

#[test]
fn test_agent_defaults() {
    let config = AgentConfig::from_args(AgentArgs::default()).unwrap();

    assert_eq!(config.address, "http://127.0.0.1:8080");
    assert_eq!(config.poll_interval, Duration::from_secs(2));
    assert_eq!(config.report_interval, Duration::from_secs(10));
    assert!(config.grpc_address.is_none());
}

#[test]
fn test_agent_env_and_flags() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();
    unsafe {
        env::set_var("POLL_INTERVAL", "500ms");
        env::set_var("ADDRESS", "localhost:9090");
    }

    let args = AgentArgs::try_parse_from(["agent", "-r", "1m", "-g", "localhost:3200"]).unwrap();
    let config = AgentConfig::from_args(args).unwrap();

    assert_eq!(config.address, "http://localhost:9090");
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.report_interval, Duration::from_secs(60));
    assert_eq!(config.grpc_address.as_deref(), Some("http://localhost:3200"));

    clear_env();
}

#[test]
fn test_agent_zero_interval_is_rejected() {
    let result = AgentConfig::from_args(AgentArgs {
        poll_interval: Some(Duration::ZERO),
        ..Default::default()
    });
    assert!(result.is_err());
}
