//! Live connection table

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::protocol::ServerEvent;

use super::{ConnectionId, Outbound};

/// Frames buffered per connection when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Table of connected clients and their send queues
///
/// Events are encoded once and the resulting text is queued to each
/// recipient; a connection's writer task drains its queue onto the socket.
/// Queues are bounded. A client that stops reading loses frames once its
/// queue is full instead of growing it.
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a hub whose per-connection queues hold `capacity` frames
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: capacity.max(1),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Allocate an identity for a new connection
    ///
    /// Returns the id and the receiving half of its send queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.connections.write().insert(id, tx);
        (id, rx)
    }

    /// Forget a connection; later sends to it are dropped
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.connections.write().remove(&id).is_some()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Number of identities handed out so far
    pub fn total_registered(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    fn encode(event: &ServerEvent) -> Option<String> {
        match event.to_json() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "Failed to encode event");
                None
            }
        }
    }

    fn deliver(&self, to: ConnectionId, text: String) -> bool {
        match self.connections.read().get(&to) {
            Some(tx) => Self::enqueue(to, tx, text),
            None => false,
        }
    }

    /// Queue without waiting; a full queue drops the frame
    fn enqueue(to: ConnectionId, tx: &mpsc::Sender<String>, text: String) -> bool {
        match tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %to, "Send queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbound for ConnectionHub {
    fn send(&self, to: ConnectionId, event: &ServerEvent) -> bool {
        match Self::encode(event) {
            Some(text) => self.deliver(to, text),
            None => false,
        }
    }

    fn broadcast(&self, event: &ServerEvent) {
        let Some(text) = Self::encode(event) else {
            return;
        };

        let connections = self.connections.read();
        for (to, tx) in connections.iter() {
            Self::enqueue(*to, tx, text.clone());
        }

        tracing::trace!(
            event = event.name(),
            recipients = connections.len(),
            "Broadcast"
        );
    }

    fn multicast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize {
        let Some(text) = Self::encode(event) else {
            return 0;
        };

        let connections = self.connections.read();
        targets
            .iter()
            .filter_map(|to| connections.get(to).map(|tx| (*to, tx)))
            .filter(|(to, tx)| Self::enqueue(*to, tx, text.clone()))
            .count()
    }
}
