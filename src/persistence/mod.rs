//! Persistence Module
//!
//! Two mutually exclusive durability strategies, chosen at startup:
//!
//! - **Snapshot**: every mutation rewrites the full store to a temp file and
//!   renames it over the canonical snapshot. O(store size) per write.
//! - **Append log**: every mutation appends its command line. O(1) per
//!   write; restart replays the whole log.
//!
//! Keys removed by lazy expiry or a sweep change the key count that
//! eviction sees, so they are persisted too: as `DEL <key>` lines in the
//! log, or by rewriting the snapshot.
//!
//! Replayed `EXPIRE` lines are evaluated against the replay-time clock, so
//! TTLs are not carried exactly across an append-log restart. Snapshots
//! store absolute deadlines and do preserve them.

mod append_log;
pub mod snapshot;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::Result;

pub use append_log::AppendLog;
pub use snapshot::Snapshot;

// == Persistence Mode ==
/// Durability strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    #[default]
    Snapshot,
    AppendLog,
}

impl FromStr for PersistenceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snapshot" | "rdb" => Ok(PersistenceMode::Snapshot),
            "append-log" | "appendlog" | "aof" => Ok(PersistenceMode::AppendLog),
            other => Err(format!("unknown persistence mode '{}'", other)),
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::Snapshot => f.write_str("snapshot"),
            PersistenceMode::AppendLog => f.write_str("append-log"),
        }
    }
}

/// State found on disk at startup
#[derive(Debug)]
pub enum Recovered {
    /// No persistence file exists yet
    Nothing,
    /// A snapshot to load directly
    Snapshot(Snapshot),
    /// Log lines to replay through the command parser, in order
    Commands(Vec<String>),
}

// == Persistence Manager ==
/// Writes mutations to disk and reads them back on restart.
#[derive(Debug)]
pub enum Persistence {
    Snapshot { path: PathBuf },
    AppendLog(AppendLog),
}

impl Persistence {
    /// Snapshot persistence at `path`.
    pub fn snapshot(path: impl Into<PathBuf>) -> Self {
        Persistence::Snapshot { path: path.into() }
    }

    /// Append-log persistence at `path`.
    pub fn append_log(path: impl Into<PathBuf>) -> Self {
        Persistence::AppendLog(AppendLog::new(path))
    }

    /// Builds the manager for the configured mode and data directory.
    pub fn from_config(config: &Config) -> Self {
        match config.persistence_mode {
            PersistenceMode::Snapshot => Self::snapshot(config.snapshot_path()),
            PersistenceMode::AppendLog => Self::append_log(config.append_log_path()),
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        match self {
            Persistence::Snapshot { .. } => PersistenceMode::Snapshot,
            Persistence::AppendLog(_) => PersistenceMode::AppendLog,
        }
    }

    /// File this manager reads and writes.
    pub fn path(&self) -> &Path {
        match self {
            Persistence::Snapshot { path } => path.as_path(),
            Persistence::AppendLog(log) => log.path(),
        }
    }

    // == Load ==
    /// Reads whatever the active mode left on disk.
    pub async fn load(&self) -> Result<Recovered> {
        let recovered = match self {
            Persistence::Snapshot { path } => snapshot::read(path)
                .await?
                .map_or(Recovered::Nothing, Recovered::Snapshot),
            Persistence::AppendLog(log) => append_log::read_lines(log.path())
                .await?
                .map_or(Recovered::Nothing, Recovered::Commands),
        };
        Ok(recovered)
    }

    // == Record ==
    /// Makes one dispatcher step durable: the keys expiry purged during it,
    /// then the accepted mutation line, if any.
    ///
    /// Must be called while the store is still locked so the file reflects
    /// changes in the order they were applied. Does nothing when there is
    /// nothing to record.
    pub async fn record(
        &mut self,
        store: &CacheStore,
        purged: &[String],
        line: Option<&str>,
    ) -> Result<()> {
        if purged.is_empty() && line.is_none() {
            return Ok(());
        }

        match self {
            Persistence::Snapshot { path } => {
                snapshot::write_atomic(path, &Snapshot::capture(store)).await?;
                debug!(path = %path.display(), keys = store.len(), "snapshot written");
            }
            Persistence::AppendLog(log) => {
                for key in purged {
                    log.append(&format!("DEL {}", key)).await?;
                }
                if let Some(line) = line {
                    log.append(line).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_mode_aliases() {
        assert_eq!("RDB".parse::<PersistenceMode>(), Ok(PersistenceMode::Snapshot));
        assert_eq!("snapshot".parse::<PersistenceMode>(), Ok(PersistenceMode::Snapshot));
        assert_eq!("aof".parse::<PersistenceMode>(), Ok(PersistenceMode::AppendLog));
        assert_eq!("append-log".parse::<PersistenceMode>(), Ok(PersistenceMode::AppendLog));
        assert!("memory".parse::<PersistenceMode>().is_err());
    }

    #[test]
    fn test_from_config_picks_file() {
        let config = Config {
            persistence_mode: PersistenceMode::AppendLog,
            data_dir: PathBuf::from("/tmp/sterling"),
            ..Config::default()
        };
        let persistence = Persistence::from_config(&config);
        assert_eq!(persistence.mode(), PersistenceMode::AppendLog);
        assert_eq!(persistence.path(), Path::new("/tmp/sterling/sterling.aof"));
    }

    #[tokio::test]
    async fn test_load_nothing_when_files_missing() {
        let dir = TempDir::new().unwrap();
        let snap = Persistence::snapshot(dir.path().join("sterling.rdb"));
        let log = Persistence::append_log(dir.path().join("sterling.aof"));

        assert!(matches!(snap.load().await.unwrap(), Recovered::Nothing));
        assert!(matches!(log.load().await.unwrap(), Recovered::Nothing));
    }

    #[tokio::test]
    async fn test_record_snapshot_writes_full_store() {
        let dir = TempDir::new().unwrap();
        let mut persistence = Persistence::snapshot(dir.path().join("sterling.rdb"));
        let mut store = CacheStore::unbounded();
        store.set("k".to_string(), "v".to_string());

        persistence.record(&store, &[], Some("SET k v")).await.unwrap();

        match persistence.load().await.unwrap() {
            Recovered::Snapshot(snapshot) => {
                assert_eq!(snapshot.entries.len(), 1);
                assert_eq!(snapshot.entries[0].value, "v");
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_append_log_writes_line() {
        let dir = TempDir::new().unwrap();
        let mut persistence = Persistence::append_log(dir.path().join("sterling.aof"));
        let store = CacheStore::unbounded();

        persistence.record(&store, &[], Some("SET k v")).await.unwrap();
        persistence.record(&store, &[], Some("EXPIRE k 10")).await.unwrap();
        persistence.record(&store, &[], None).await.unwrap();

        match persistence.load().await.unwrap() {
            Recovered::Commands(lines) => assert_eq!(lines, vec!["SET k v", "EXPIRE k 10"]),
            other => panic!("expected commands, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_append_log_writes_purged_keys_before_line() {
        let dir = TempDir::new().unwrap();
        let mut persistence = Persistence::append_log(dir.path().join("sterling.aof"));
        let store = CacheStore::unbounded();
        let purged = vec!["old".to_string(), "stale".to_string()];

        persistence.record(&store, &purged, Some("SET k v")).await.unwrap();
        persistence.record(&store, &purged[..1], None).await.unwrap();

        match persistence.load().await.unwrap() {
            Recovered::Commands(lines) => {
                assert_eq!(lines, vec!["DEL old", "DEL stale", "SET k v", "DEL old"])
            }
            other => panic!("expected commands, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_with_nothing_to_persist_writes_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.rdb");
        let mut persistence = Persistence::snapshot(&path);

        persistence
            .record(&CacheStore::unbounded(), &[], None)
            .await
            .unwrap();
        assert!(!path.exists());
    }
}
