//! Expiry Sweeper Task
//!
//! Optional background task that purges expired keys without waiting for a
//! read to touch them. Disabled unless a sweep interval is configured.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;

/// Spawns a background task that periodically purges expired keys.
///
/// Each run takes the dispatcher lock, so a sweep is serialized with client
/// commands like any other operation. In snapshot mode a sweep that removed
/// keys rewrites the snapshot.
///
/// # Arguments
/// * `dispatcher` - Shared dispatcher owning the store
/// * `interval_secs` - Seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweeper_task(dispatcher.clone(), 5);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweeper_task(dispatcher: Arc<Dispatcher>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweeper with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match dispatcher.sweep().await {
                Ok(0) => debug!("Expiry sweep: no expired keys found"),
                Ok(removed) => info!("Expiry sweep: removed {} expired keys", removed),
                Err(e) => error!("Expiry sweep failed to persist: {}", e),
            }
        }
    })
}
