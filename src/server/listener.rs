//! TCP Listener
//!
//! Accepts connections and spawns one task per client.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::server::handle_connection;

/// Binds the listen address.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accepts clients until `shutdown` completes.
///
/// Connections already being served keep running in their own tasks;
/// only the accept loop stops.
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            error!(peer = %addr, "failed to set TCP_NODELAY: {}", e);
                        }
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(handle_connection(stream, addr.to_string(), dispatcher));
                    }
                    Err(e) => {
                        // Transient (e.g. EMFILE); keep accepting
                        error!("accept failed: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("listener stopped accepting connections");
                return Ok(());
            }
        }
    }
}
