//! Statistics for the signaling server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters bumped by message handlers
#[derive(Debug)]
pub struct Counters {
    started_at: Instant,
    relayed: AtomicU64,
    relay_dropped: AtomicU64,
    chat_messages: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            relayed: AtomicU64::new(0),
            relay_dropped: AtomicU64::new(0),
            chat_messages: AtomicU64::new(0),
        }
    }

    /// Record the outcome of one relay attempt
    pub fn record_relay(&self, delivered: bool) {
        if delivered {
            self.relayed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.relay_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_chat(&self) {
        self.chat_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    pub fn relay_dropped(&self) -> u64 {
        self.relay_dropped.load(Ordering::Relaxed)
    }

    pub fn chat_messages(&self) -> u64 {
        self.chat_messages.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Total connections ever
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Active streams
    pub active_streams: u64,
    /// Viewers across all streams
    pub active_viewers: u64,
    /// Negotiation messages delivered
    pub relayed_messages: u64,
    /// Negotiation messages whose target was gone
    pub dropped_relays: u64,
    /// Chat messages fanned out
    pub chat_messages: u64,
    /// Uptime
    pub uptime: Duration,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }
}
