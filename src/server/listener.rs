//! Signaling server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::hub::ConnectionHub;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::session::SessionManager;
use crate::stats::ServerStats;

/// Signaling server
///
/// Constructing a server constructs its registry; dropping the server
/// after shutdown discards every stream.
pub struct SignalingServer {
    config: ServerConfig,
    hub: Arc<ConnectionHub>,
    sessions: Arc<SessionManager<ConnectionHub>>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl SignalingServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let hub = Arc::new(ConnectionHub::with_queue_capacity(
            config.send_queue_capacity,
        ));
        let sessions = Arc::new(SessionManager::new(
            config.session.clone(),
            Arc::clone(&hub),
        ));

        Self {
            config,
            hub,
            sessions,
            connection_semaphore,
        }
    }

    /// Get a reference to the session manager
    pub fn sessions(&self) -> &Arc<SessionManager<ConnectionHub>> {
        &self.sessions
    }

    /// Get a reference to the connection table
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Server-wide statistics
    pub async fn stats(&self) -> ServerStats {
        let (streams, viewers) = self.sessions.occupancy().await;
        let counters = self.sessions.counters();

        ServerStats {
            total_connections: self.hub.total_registered(),
            active_connections: self.hub.len() as u64,
            active_streams: streams as u64,
            active_viewers: viewers as u64,
            relayed_messages: counters.relayed(),
            dropped_relays: counters.relay_dropped(),
            chat_messages: counters.chat_messages(),
            uptime: counters.uptime(),
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Signaling server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        tracing::debug!(peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let connection = Connection::new(
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.hub),
            Arc::clone(&self.sessions),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
