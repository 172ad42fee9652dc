//! Snapshot persistence
//!
//! Full point-in-time copies of the store, written atomically.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized store state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Entries in store insertion order
    pub entries: Vec<SnapshotEntry>,
}

/// One key with its value and absolute expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Copies the full store, expired-but-unread keys included.
    pub fn capture(store: &CacheStore) -> Self {
        let entries = store
            .entries()
            .map(|(key, value, expires_at)| SnapshotEntry {
                key: key.clone(),
                value: value.clone(),
                expires_at,
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    /// Replaces the store contents with this snapshot.
    pub fn restore_into(self, store: &mut CacheStore) {
        store.clear();
        for entry in self.entries {
            store.restore_entry(entry.key, entry.value, entry.expires_at);
        }
    }
}

/// Reads a snapshot file. A missing file yields `None`.
pub async fn read(path: &Path) -> Result<Option<Snapshot>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CacheError::Snapshot(<serde_json::Error as serde::de::Error>::custom(format!(
            "unsupported snapshot version {}",
            snapshot.version
        ))));
    }
    Ok(Some(snapshot))
}

/// Writes the snapshot to a sibling temp file, syncs it, then renames it
/// over `path` so readers only ever see a complete snapshot.
pub async fn write_atomic(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp_path = temp_path(path);
    let json = serde_json::to_vec(snapshot)?;

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// `<path>.tmp`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
