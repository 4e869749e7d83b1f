//! Relay server module
//!
//! Binds the listener and hands every accepted connection to its own
//! handshake task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::common::{tune_stream, RelayError, Result};
use crate::config::RelayConfig;
use super::handshake::{handle_connection, Leg, Outcome};
use super::registry::Registry;

/// Registry type used by the TCP relay
pub type TcpRegistry = Registry<Leg<TcpStream>>;

/// Rendezvous relay server
///
/// Accepts TCP connections and pairs them through a shared registry.
pub struct Relay {
    listener: TcpListener,
    registry: Arc<TcpRegistry>,
    config: Arc<RelayConfig>,
}

impl Relay {
    /// Bind the listen address from `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: Arc<RelayConfig>, registry: Arc<TcpRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(config.listen).await
            .map_err(RelayError::Io)?;

        Ok(Self { listener, registry, config })
    }

    /// Address the relay is actually listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Registry shared by all connections of this relay
    pub fn registry(&self) -> &Arc<TcpRegistry> {
        &self.registry
    }

    /// Run until Ctrl+C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        }).await
    }

    /// Run until `shutdown` resolves
    ///
    /// Handshakes still in progress are aborted on shutdown; active
    /// pairings keep running until the runtime stops.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = self.local_addr()?;
        info!("Relay started, listening on {}", local_addr);

        let mut tasks: JoinSet<()> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_handshake(&mut tasks, stream, peer),
                    Err(e) => error!("Error accepting connection: {}", e),
                },

                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        error!("Handshake task failed: {}", e);
                    }
                }
            }
        }

        let pending = tasks.len();
        if pending > 0 {
            debug!("Aborting {} handshakes in progress", pending);
        }
        tasks.shutdown().await;

        info!("Relay on {} stopped", local_addr);
        Ok(())
    }

    fn spawn_handshake(&self, tasks: &mut JoinSet<()>, stream: TcpStream, peer: SocketAddr) {
        debug!("Accepted connection from {}", peer);

        if let Err(e) = tune_stream(&stream, self.config.tcp_nodelay, self.config.keepalive()) {
            warn!("Failed to set socket options for {}: {}", peer, e);
        }

        let registry = Arc::clone(&self.registry);
        let config = Arc::clone(&self.config);

        tasks.spawn(async move {
            match handle_connection(stream, registry, config).await {
                Ok(Outcome::Waiting { id, role, .. }) => {
                    debug!("{} registered as {} for {}", peer, role, id);
                }
                Ok(Outcome::Paired { id, .. }) => {
                    debug!("{} completed pairing {}", peer, id);
                }
                Err(e @ RelayError::UnknownIdentifier(_)) => {
                    error!("Registry invariant violated for {}: {}", peer, e);
                }
                Err(e) if e.is_client_error() => {
                    info!("Closed connection from {}: {}", peer, e);
                }
                Err(e) => {
                    warn!("Handshake with {} failed: {}", peer, e);
                }
            }
        });
    }
}
