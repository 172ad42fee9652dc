//! Sterling Cache - an in-memory key-value cache server
//!
//! Serves the line protocol over TCP with snapshot or append-log persistence.

use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sterling_cache::config::LogConfig;
use sterling_cache::{server, spawn_sweeper_task, Config, Dispatcher};

/// Main entry point for the Sterling cache server.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing to the console or a log file
/// 3. Reload persisted state (fails fast on a corrupt snapshot or log)
/// 4. Start the optional expiry sweeper
/// 5. Bind the listener and serve until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.log)?;

    info!("Starting Sterling Cache Server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: persistence={}, data_dir={}, max_keys={:?}, eviction={}, sweep_interval={}s",
        config.persistence_mode,
        config.data_dir.display(),
        config.max_keys,
        config.eviction_policy,
        config.sweep_interval
    );

    let dispatcher = Arc::new(
        Dispatcher::open(&config)
            .await
            .context("failed to reload persisted state")?,
    );
    info!("Cache store initialized with {} keys", dispatcher.len().await);

    let sweeper = (config.sweep_interval > 0)
        .then(|| spawn_sweeper_task(dispatcher.clone(), config.sweep_interval));

    let listener = server::bind(&config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;
    info!("Sterling Cache Server running on {}", config.listen_addr());

    server::serve(listener, dispatcher, shutdown_signal()).await?;

    if let Some(handle) = sweeper {
        handle.abort();
        warn!("Expiry sweeper aborted");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Installs the global subscriber.
///
/// Console output defaults to `info`; file output defaults to `debug` and is
/// truncated on start when fresh logs are requested. `RUST_LOG` overrides both.
fn init_tracing(log: &LogConfig) -> anyhow::Result<()> {
    let default_filter = if log.to_file {
        "sterling_cache=debug"
    } else {
        "sterling_cache=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    if log.to_file {
        if let Some(parent) = log.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!log.fresh)
            .truncate(log.fresh)
            .open(&log.file_path)
            .with_context(|| format!("failed to open log file {}", log.file_path.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
