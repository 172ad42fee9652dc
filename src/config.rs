//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::EvictionPolicy;
use crate::error::{CacheError, Result};
use crate::persistence::PersistenceMode;

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILE: &str = "sterling.rdb";

/// Append-log file name inside the data directory
pub const APPEND_LOG_FILE: &str = "sterling.aof";

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Durability strategy
    pub persistence_mode: PersistenceMode,
    /// Directory holding the snapshot and append-log files
    pub data_dir: PathBuf,
    /// Maximum number of keys, None = unbounded
    pub max_keys: Option<usize>,
    /// Rule applied when `max_keys` is reached
    pub eviction_policy: EvictionPolicy,
    /// Background expiry sweep interval in seconds, 0 = lazy expiry only
    pub sweep_interval: u64,
    /// Where log output goes
    pub log: LogConfig,
}

/// Logging destination settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Write logs to `file_path` instead of the console
    pub to_file: bool,
    /// Log file location when `to_file` is set
    pub file_path: PathBuf,
    /// Truncate the log file on start instead of appending
    pub fresh: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            to_file: false,
            file_path: PathBuf::from("log/server_logs.log"),
            fresh: false,
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STERLING_HOST` - Listen host (default: 127.0.0.1)
    /// - `STERLING_PORT` - Listen port (default: 9162)
    /// - `STERLING_PERSISTENCE` - `snapshot`/`rdb` or `append-log`/`aof` (default: snapshot)
    /// - `STERLING_DATA_DIR` - Directory for persistence files (default: .)
    /// - `STERLING_MAX_KEYS` - Key capacity (default: unbounded)
    /// - `STERLING_EVICTION` - `noeviction`, `lru` or `allkeys-lru` (default: noeviction)
    /// - `STERLING_SWEEP_INTERVAL` - Expiry sweep period in seconds (default: 0, disabled)
    /// - `STERLING_LOG_TO_FILE` - Log to a file instead of the console (default: false)
    /// - `STERLING_LOG_FILE` - Log file path (default: log/server_logs.log)
    /// - `STERLING_FRESH_LOGS` - Truncate the log file on start (default: false)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    ///
    /// Missing variables take their default; present but unparseable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_keys = match lookup("STERLING_MAX_KEYS") {
            Some(raw) => {
                let keys: usize = parse_var("STERLING_MAX_KEYS", &raw)?;
                if keys == 0 {
                    return Err(CacheError::Config(
                        "STERLING_MAX_KEYS must be at least 1".to_string(),
                    ));
                }
                Some(keys)
            }
            None => defaults.max_keys,
        };

        Ok(Self {
            host: lookup("STERLING_HOST").unwrap_or(defaults.host),
            port: optional_var(&lookup, "STERLING_PORT")?.unwrap_or(defaults.port),
            persistence_mode: optional_var(&lookup, "STERLING_PERSISTENCE")?
                .unwrap_or(defaults.persistence_mode),
            data_dir: lookup("STERLING_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_keys,
            eviction_policy: optional_var(&lookup, "STERLING_EVICTION")?
                .unwrap_or(defaults.eviction_policy),
            sweep_interval: optional_var(&lookup, "STERLING_SWEEP_INTERVAL")?
                .unwrap_or(defaults.sweep_interval),
            log: LogConfig {
                to_file: optional_var(&lookup, "STERLING_LOG_TO_FILE")?
                    .unwrap_or(defaults.log.to_file),
                file_path: lookup("STERLING_LOG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.log.file_path),
                fresh: optional_var(&lookup, "STERLING_FRESH_LOGS")?
                    .unwrap_or(defaults.log.fresh),
            },
        })
    }

    /// `host:port` string for binding the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the canonical snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    /// Path of the append-only command log.
    pub fn append_log_path(&self) -> PathBuf {
        self.data_dir.join(APPEND_LOG_FILE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9162,
            persistence_mode: PersistenceMode::Snapshot,
            data_dir: PathBuf::from("."),
            max_keys: None,
            eviction_policy: EvictionPolicy::NoEviction,
            sweep_interval: 0,
            log: LogConfig::default(),
        }
    }
}

fn optional_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map(|raw| parse_var(name, &raw)).transpose()
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| CacheError::Config(format!("{}={:?}: {}", name, raw, e)))
}
