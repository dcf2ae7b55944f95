//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds a socket and spawns a Connection task for each
//! incoming client. It stops accepting once the registry signals shutdown,
//! then gives the remaining connection tasks time to flush and exit.

use crate::network::Connection;
use crate::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// Extra time allowed on top of the flush window for tasks to wind down.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    hub: Arc<Hub>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(addr: SocketAddr, hub: Arc<Hub>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Listener bound");
        Ok(Self::from_listener(listener, hub))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(listener: TcpListener, hub: Arc<Hub>) -> Self {
        Self { listener, hub }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the registry is closed.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let shutdown = self.hub.registry.shutdown_token();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signalled - no longer accepting");
                    break;
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let id = self.hub.next_connection_id();
                        info!(conn = %id, %addr, "Connection accepted");

                        let hub = Arc::clone(&self.hub);
                        tasks.spawn(async move {
                            if let Err(e) = Connection::new(id, stream, addr, hub).run().await {
                                error!(conn = %id, %addr, error = %e, "Connection error");
                            }
                            info!(conn = %id, %addr, "Connection closed");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        drop(self.listener);

        let remaining = tasks.len();
        let deadline = self.hub.limits.shutdown_flush() + DRAIN_GRACE;
        let drained = tokio::time::timeout(deadline, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "Connection tasks still running after shutdown - aborting"
            );
            tasks.shutdown().await;
        } else {
            info!(connections = remaining, "All connection tasks finished");
        }

        Ok(())
    }
}
