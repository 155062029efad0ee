//! Stream entry types
//!
//! This module defines the per-stream state stored in the registry.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;

use crate::hub::ConnectionId;
use crate::protocol::Metadata;

use super::key::StreamKey;

/// Entry for a single stream in the registry
#[derive(Debug, Clone)]
pub struct StreamEntry {
    /// Stream key (unique across the registry)
    pub key: StreamKey,

    /// Connection currently broadcasting this stream
    pub streamer: ConnectionId,

    /// Descriptive fields supplied by the streamer, passed through verbatim
    pub metadata: Metadata,

    /// Connections subscribed to this stream
    pub(super) viewers: HashSet<ConnectionId>,

    /// When the stream was registered
    pub started_at: Instant,
}

impl StreamEntry {
    pub(super) fn new(key: StreamKey, streamer: ConnectionId, metadata: Metadata) -> Self {
        Self {
            key,
            streamer,
            metadata,
            viewers: HashSet::new(),
            started_at: Instant::now(),
        }
    }

    /// Get the number of viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Check whether a connection is watching this stream
    pub fn has_viewer(&self, viewer: ConnectionId) -> bool {
        self.viewers.contains(&viewer)
    }

    /// Current viewers, sorted for stable fan-out order
    pub fn viewers(&self) -> Vec<ConnectionId> {
        let mut viewers: Vec<_> = self.viewers.iter().copied().collect();
        viewers.sort();
        viewers
    }

    /// Streamer followed by every viewer
    pub fn participants(&self) -> Vec<ConnectionId> {
        let mut participants = Vec::with_capacity(self.viewers.len() + 1);
        participants.push(self.streamer);
        participants.extend(self.viewers());
        participants
    }

    /// Snapshot used for discovery listings
    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            stream_key: self.key.clone(),
            metadata: self.metadata.clone(),
            viewer_count: self.viewer_count(),
        }
    }
}

/// Discovery view of a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub stream_key: StreamKey,
    pub metadata: Metadata,
    pub viewer_count: usize,
}
