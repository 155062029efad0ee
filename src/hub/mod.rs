//! Connection identity and outbound delivery
//!
//! Each live connection gets a [`ConnectionId`] for its lifetime and an
//! bounded send queue drained by its writer task. The session and relay
//! layers only see the [`Outbound`] trait.

mod connections;

pub use connections::{ConnectionHub, DEFAULT_QUEUE_CAPACITY};

use serde::{Deserialize, Serialize};

use crate::protocol::ServerEvent;

/// Stable identifier of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery of server events to connected clients
///
/// Implementations must not block: handlers call these while holding the
/// registry lock.
pub trait Outbound: Send + Sync + 'static {
    /// Send to one connection; `false` if it is not connected or its
    /// queue is full
    fn send(&self, to: ConnectionId, event: &ServerEvent) -> bool;

    /// Send to every connection
    fn broadcast(&self, event: &ServerEvent);

    /// Send to each listed connection, returning how many were reached
    fn multicast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize {
        targets.iter().filter(|to| self.send(**to, event)).count()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording [`Outbound`] for handler tests

    use parking_lot::Mutex;

    use super::*;

    /// Who an event was addressed to
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Target {
        One(ConnectionId),
        All,
    }

    /// Captures every event instead of delivering it
    #[derive(Default)]
    pub struct RecordingOutbound {
        connected: Mutex<Vec<ConnectionId>>,
        sent: Mutex<Vec<(Target, ServerEvent)>>,
    }

    impl RecordingOutbound {
        /// Mark connections as reachable by `send`
        pub fn connect(&self, ids: &[u64]) {
            self.connected
                .lock()
                .extend(ids.iter().copied().map(ConnectionId::new));
        }

        pub fn disconnect(&self, id: u64) {
            self.connected.lock().retain(|c| c.get() != id);
        }

        /// Drain what was recorded so far
        pub fn take(&self) -> Vec<(Target, ServerEvent)> {
            std::mem::take(&mut *self.sent.lock())
        }
    }

    impl Outbound for RecordingOutbound {
        fn send(&self, to: ConnectionId, event: &ServerEvent) -> bool {
            if !self.connected.lock().contains(&to) {
                return false;
            }
            self.sent.lock().push((Target::One(to), event.clone()));
            true
        }

        fn broadcast(&self, event: &ServerEvent) {
            self.sent.lock().push((Target::All, event.clone()));
        }
    }
}
