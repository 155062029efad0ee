//! Per-connection WebSocket handling
//!
//! One task reads frames and feeds them to the session layer; a second
//! drains the connection's send queue onto the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;
use crate::hub::{ConnectionHub, ConnectionId, Outbound};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::server::config::ServerConfig;
use crate::session::SessionManager;

/// How long queued frames may take to flush after the reader stops
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct Connection {
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<ConnectionHub>,
    sessions: Arc<SessionManager<ConnectionHub>>,
}

impl Connection {
    pub(crate) fn new(
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<ConnectionHub>,
        sessions: Arc<SessionManager<ConnectionHub>>,
    ) -> Self {
        Self {
            peer_addr,
            config,
            hub,
            sessions,
        }
    }

    /// Upgrade the socket and serve it until either side closes
    pub(crate) async fn run(self, socket: TcpStream) -> Result<()> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let ws = tokio_tungstenite::accept_async_with_config(socket, Some(ws_config)).await?;
        let (mut sink, mut stream) = ws.split();

        let (id, mut queue) = self.hub.register();
        let hello = ServerEvent::Connected { connection_id: id }.to_json()?;

        tracing::debug!(connection_id = %id, peer = %self.peer_addr, "WebSocket established");

        let mut writer = tokio::spawn(async move {
            // Identity goes out before anything queued by other handlers
            if sink.send(Message::Text(hello)).await.is_err() {
                return;
            }
            while let Some(text) = queue.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!(connection_id = %id, error = %e, "Write failed");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => self.on_text(id, &text).await,
                Ok(Message::Binary(_)) => {
                    self.hub.send(
                        id,
                        &ServerEvent::Error {
                            message: "Binary frames are not supported".into(),
                        },
                    );
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(connection_id = %id, error = %e, "Read failed");
                    break;
                }
            }
        }

        self.sessions.disconnect(id).await;
        self.hub.unregister(id);

        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }

        tracing::debug!(connection_id = %id, peer = %self.peer_addr, "WebSocket closed");

        Ok(())
    }

    async fn on_text(&self, id: ConnectionId, text: &str) {
        match ClientEvent::decode(text) {
            Ok(event) => {
                tracing::trace!(connection_id = %id, event = event.name(), "Inbound");
                self.sessions.handle(id, event).await;
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Undecodable frame");
                self.hub.send(
                    id,
                    &ServerEvent::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
    }
}
