//! Configuration module for the metrics server and agent.
//!
//! Each binary builds its configuration once at startup and passes it by
//! reference into the components it constructs. Values are resolved from, in
//! order of precedence: command-line flag, environment variable (a `.env` file
//! is loaded first by the binaries), JSON config file (`-c` / `CONFIG`), then
//! the built-in default.

mod agent_config;
mod server_config;

pub use agent_config::{AgentArgs, AgentConfig};
pub use server_config::{BackendKind, ServerArgs, ServerConfig};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// Parse `500ms`, `10s`, `2m`, `1h`, or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration {:?}", raw))?;
    let seconds = match unit.trim() {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit {:?} in {:?}", other, raw)),
    };
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration {:?}: {}", raw, e))
}

/// Treat empty strings as unset
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Read a JSON config file, or the type's default when no path is given
pub(crate) fn load_file<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Resolve an optional duration string from the file layer
pub(crate) fn file_duration(raw: Option<String>, name: &str) -> Result<Option<Duration>> {
    non_empty(raw)
        .map(|r| parse_duration(&r).map_err(|e| anyhow::anyhow!("{}: {}", name, e)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("300").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ten").is_err());
        assert!(parse_duration("5 days").is_err());
    }
}
