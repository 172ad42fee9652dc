//! Command Dispatcher
//!
//! Translates protocol lines into store operations and reply lines.
//!
//! The store and the persistence manager sit behind one async mutex: at most
//! one command touches cache state at a time, and persistence writes happen
//! before that lock is released.

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::persistence::{Persistence, Recovered};
use crate::protocol::{Command, Reply};

/// State guarded by the dispatcher lock
#[derive(Debug)]
struct CacheState {
    store: CacheStore,
    persistence: Persistence,
}

/// Shared entry point for every connection.
#[derive(Debug)]
pub struct Dispatcher {
    state: Mutex<CacheState>,
}

impl Dispatcher {
    /// Wraps an existing store and persistence manager.
    pub fn new(store: CacheStore, persistence: Persistence) -> Self {
        Self {
            state: Mutex::new(CacheState { store, persistence }),
        }
    }

    /// Builds the dispatcher from configuration and reloads persisted state.
    ///
    /// Fails if the persisted state cannot be read back completely.
    pub async fn open(config: &Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let store = CacheStore::new(config.max_keys, config.eviction_policy);
        let dispatcher = Self::new(store, Persistence::from_config(config));
        dispatcher.restore().await?;
        Ok(dispatcher)
    }

    // == Restore ==
    /// Loads the snapshot or replays the append log into the store.
    ///
    /// Replayed commands run through the same parser as live traffic but are
    /// not written back to the log. Returns the number of keys afterwards.
    pub async fn restore(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let CacheState { store, persistence } = &mut *state;

        match persistence.load().await? {
            Recovered::Nothing => {
                info!(mode = %persistence.mode(), "no persisted state, starting empty");
            }
            Recovered::Snapshot(snapshot) => {
                snapshot.restore_into(store);
                info!(keys = store.len(), "snapshot loaded");
            }
            Recovered::Commands(lines) => {
                let mut replayed = 0usize;
                for (index, line) in lines.iter().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    Command::parse(line)
                        .and_then(|command| apply(store, command))
                        .map_err(|e| CacheError::Replay {
                            line: index + 1,
                            reason: e.to_string(),
                        })?;
                    replayed += 1;
                }
                // Replay-time purges are not written back to the log
                store.take_purged();
                info!(commands = replayed, keys = store.len(), "append log replayed");
            }
        }

        Ok(store.len())
    }

    // == Execute ==
    /// Runs one protocol line and renders the reply text.
    ///
    /// Never fails: every error becomes an `ERR ...` reply.
    pub async fn execute(&self, line: &str) -> String {
        match self.run(line).await {
            Ok(reply) => reply.to_string(),
            Err(e) => e.reply_text(),
        }
    }

    /// Runs one protocol line and returns the typed result.
    pub async fn run(&self, line: &str) -> Result<Reply> {
        let command = Command::parse(line)?;
        let mutation = command.is_mutation();

        let mut state = self.state.lock().await;
        let CacheState { store, persistence } = &mut *state;

        let result = apply(store, command);

        // Expiry purges from reads are persisted; the read itself is not
        let purged = store.take_purged();
        let accepted = (mutation && result.is_ok()).then(|| line.trim());
        if let Err(e) = persistence.record(store, &purged, accepted).await {
            error!(
                command = line.trim(),
                path = %persistence.path().display(),
                purged = purged.len(),
                "persistence write failed: {}",
                e
            );
            return Err(e);
        }

        result
    }

    // == Sweep ==
    /// Purges every expired key now. Returns the number removed.
    pub async fn sweep(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let CacheState { store, persistence } = &mut *state;

        let removed = store.purge_expired();
        let purged = store.take_purged();
        persistence.record(store, &purged, None).await?;
        Ok(removed)
    }

    /// Number of keys currently held, expired-but-unread ones included.
    pub async fn len(&self) -> usize {
        self.state.lock().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Applies a parsed command to the store.
fn apply(store: &mut CacheStore, command: Command) -> Result<Reply> {
    let reply = match command {
        Command::Set { key, value } => {
            store.set(key, value);
            Reply::Ok
        }
        Command::Get { key } => store.get(&key).map_or(Reply::Nil, Reply::Value),
        Command::Del { key } => {
            store.delete(&key);
            Reply::Ok
        }
        Command::Exists { key } => Reply::Bool(store.exists(&key)),
        Command::Expire { key, seconds } => {
            // Missing keys still get OK on the wire
            if !store.expire(&key, seconds)? {
                debug!(key = %key, "EXPIRE on missing key ignored");
            }
            Reply::Ok
        }
        Command::Ttl { key } => Reply::Integer(store.ttl(&key)),
        Command::Keys => Reply::Keys(store.keys()),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvictionPolicy;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn snapshot_dispatcher(dir: &TempDir) -> Dispatcher {
        Dispatcher::new(
            CacheStore::unbounded(),
            Persistence::snapshot(dir.path().join("sterling.rdb")),
        )
    }

    #[tokio::test]
    async fn test_execute_command_table() {
        let dir = TempDir::new().unwrap();
        let dispatcher = snapshot_dispatcher(&dir);

        assert_eq!(dispatcher.execute("KEYS").await, "(empty)");
        assert_eq!(dispatcher.execute("SET name sterling cache").await, "OK");
        assert_eq!(dispatcher.execute("GET name").await, "sterling cache");
        assert_eq!(dispatcher.execute("EXISTS name").await, "1");
        assert_eq!(dispatcher.execute("TTL name").await, "-1");
        assert_eq!(dispatcher.execute("EXPIRE name 100").await, "OK");
        let ttl: i64 = dispatcher.execute("TTL name").await.parse().unwrap();
        assert!((0..=100).contains(&ttl));
        assert_eq!(dispatcher.execute("DEL name").await, "OK");
        assert_eq!(dispatcher.execute("GET name").await, "(nil)");
        assert_eq!(dispatcher.execute("EXISTS name").await, "0");
        assert_eq!(dispatcher.execute("TTL name").await, "-2");
    }

    #[tokio::test]
    async fn test_execute_errors_become_replies() {
        let dir = TempDir::new().unwrap();
        let dispatcher = snapshot_dispatcher(&dir);

        assert_eq!(dispatcher.execute("").await, "ERR unknown command");
        assert_eq!(dispatcher.execute("FLUSHALL").await, "ERR unknown command");
        assert_eq!(dispatcher.execute("GET").await, "ERR unknown command");
        assert!(dispatcher
            .execute("EXPIRE k later")
            .await
            .starts_with("ERR value is not an integer"));
    }

    #[tokio::test]
    async fn test_expire_missing_key_replies_ok() {
        let dir = TempDir::new().unwrap();
        let dispatcher = snapshot_dispatcher(&dir);

        assert_eq!(dispatcher.execute("EXPIRE ghost 10").await, "OK");
        assert_eq!(dispatcher.execute("TTL ghost").await, "-2");
    }

    #[tokio::test]
    async fn test_keys_lists_each_key_once_in_order() {
        let dir = TempDir::new().unwrap();
        let dispatcher = snapshot_dispatcher(&dir);

        dispatcher.execute("SET b 1").await;
        dispatcher.execute("SET a 2").await;
        dispatcher.execute("SET c 3").await;
        dispatcher.execute("SET b 4").await;

        assert_eq!(dispatcher.execute("KEYS").await, "b a c");
    }

    #[tokio::test]
    async fn test_eviction_through_dispatcher() {
        let dir = TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(
            CacheStore::new(Some(2), EvictionPolicy::Lru),
            Persistence::snapshot(dir.path().join("sterling.rdb")),
        );

        dispatcher.execute("SET a 1").await;
        dispatcher.execute("SET b 2").await;
        dispatcher.execute("SET c 3").await;

        assert_eq!(dispatcher.execute("GET a").await, "(nil)");
        assert_eq!(dispatcher.execute("KEYS").await, "b c");
    }

    #[tokio::test]
    async fn test_snapshot_written_on_every_mutation_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.rdb");
        let dispatcher = snapshot_dispatcher(&dir);

        dispatcher.execute("GET nothing").await;
        assert!(!path.exists(), "reads must not persist");

        dispatcher.execute("SET a 1").await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_persistence_failure_replies_err() {
        let dir = TempDir::new().unwrap();
        // Snapshot target inside a directory that does not exist
        let dispatcher = Dispatcher::new(
            CacheStore::unbounded(),
            Persistence::snapshot(dir.path().join("missing").join("sterling.rdb")),
        );

        let reply = dispatcher.execute("SET a 1").await;
        assert!(reply.starts_with("ERR I/O error"), "got {:?}", reply);
        assert_err!(dispatcher.run("DEL a").await);
    }

    #[tokio::test]
    async fn test_append_log_replay_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.aof");
        std::fs::write(&path, "SET a 1\n\nset b two words\nDEL a\n").unwrap();

        let dispatcher = Dispatcher::new(CacheStore::unbounded(), Persistence::append_log(&path));
        assert_eq!(assert_ok!(dispatcher.restore().await), 1);
        assert_eq!(dispatcher.execute("GET b").await, "two words");
        assert_eq!(dispatcher.execute("GET a").await, "(nil)");

        // Replay must not have appended anything
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_append_log_replay_fails_fast_on_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.aof");
        std::fs::write(&path, "SET a 1\nEXPIRE a soon\nSET b 2\n").unwrap();

        let dispatcher = Dispatcher::new(CacheStore::unbounded(), Persistence::append_log(&path));
        match dispatcher.restore().await {
            Err(CacheError::Replay { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected replay error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sweep_purges_and_rewrites_snapshot() {
        let dir = TempDir::new().unwrap();
        let dispatcher = snapshot_dispatcher(&dir);

        dispatcher.execute("SET a 1").await;
        dispatcher.execute("SET b 2").await;
        dispatcher.execute("EXPIRE a -1").await;

        assert_eq!(dispatcher.sweep().await.unwrap(), 1);
        assert_eq!(dispatcher.execute("KEYS").await, "b");
        assert_eq!(dispatcher.sweep().await.unwrap(), 0);

        let reopened = snapshot_dispatcher(&dir);
        assert_eq!(assert_ok!(reopened.restore().await), 1);
        assert_eq!(reopened.execute("KEYS").await, "b");
    }

    fn bounded_dispatcher(persistence: Persistence) -> Dispatcher {
        Dispatcher::new(CacheStore::new(Some(2), EvictionPolicy::Lru), persistence)
    }

    #[tokio::test]
    async fn test_append_log_replay_after_lazy_purge_keeps_live_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.aof");

        let live = bounded_dispatcher(Persistence::append_log(&path));
        for line in ["SET a 1", "SET b 2", "EXPIRE b -1", "GET b", "SET c 3"] {
            live.execute(line).await;
        }
        assert_eq!(live.execute("GET a").await, "1");
        assert_eq!(live.execute("KEYS").await, "a c");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().collect::<Vec<_>>(),
            vec!["SET a 1", "SET b 2", "EXPIRE b -1", "DEL b", "SET c 3"]
        );

        let replayed = bounded_dispatcher(Persistence::append_log(&path));
        assert_eq!(assert_ok!(replayed.restore().await), 2);
        assert_eq!(replayed.execute("GET a").await, "1");
        assert_eq!(replayed.execute("KEYS").await, "a c");
    }

    #[tokio::test]
    async fn test_append_log_records_swept_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.aof");

        let live = bounded_dispatcher(Persistence::append_log(&path));
        for line in ["SET a 1", "SET b 2", "EXPIRE b -1"] {
            live.execute(line).await;
        }
        assert_eq!(live.sweep().await.unwrap(), 1);
        live.execute("SET c 3").await;

        let replayed = bounded_dispatcher(Persistence::append_log(&path));
        assert_ok!(replayed.restore().await);
        assert_eq!(replayed.execute("KEYS").await, live.execute("KEYS").await);
        assert_eq!(replayed.execute("GET a").await, "1");
    }

    #[tokio::test]
    async fn test_snapshot_rewritten_when_read_purges_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sterling.rdb");

        let live = bounded_dispatcher(Persistence::snapshot(&path));
        for line in ["SET a 1", "SET b 2", "EXPIRE b -1"] {
            live.execute(line).await;
        }
        assert_eq!(live.execute("EXISTS b").await, "0");

        let reopened = bounded_dispatcher(Persistence::snapshot(&path));
        assert_eq!(assert_ok!(reopened.restore().await), 1);
        reopened.execute("SET c 3").await;
        assert_eq!(reopened.execute("GET a").await, "1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            CacheStore::unbounded(),
            Persistence::append_log(dir.path().join("sterling.aof")),
        ));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    let line = format!("SET key_{}_{} value_{}", worker, i, i);
                    assert_eq!(dispatcher.execute(&line).await, "OK");
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(dispatcher.len().await, 200);
        for worker in 0..8 {
            for i in 0..25 {
                let reply = dispatcher.execute(&format!("GET key_{}_{}", worker, i)).await;
                assert_eq!(reply, format!("value_{}", i));
            }
        }
    }
}
