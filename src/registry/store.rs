//! Stream registry implementation
//!
//! Owns the active streams together with the two reverse indexes (viewer
//! membership and streamer ownership). Every mutator keeps all three
//! structures in lock-step, so callers never patch an index by hand.

use std::collections::HashMap;

use crate::hub::ConnectionId;
use crate::protocol::Metadata;
use crate::session::SessionRole;

use super::config::RegistryConfig;
use super::entry::{StreamEntry, StreamSummary};
use super::error::RegistryError;
use super::key::StreamKey;

/// Registry of active streams and their viewers
///
/// Not internally synchronized: the [`SessionManager`](crate::session::SessionManager)
/// owns it behind a single lock so each handler mutates it as one unit.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    /// Map of stream key to stream entry
    streams: HashMap<StreamKey, StreamEntry>,

    /// Viewer connection -> stream it is watching
    viewer_index: HashMap<ConnectionId, StreamKey>,

    /// Streamer connection -> stream it owns
    streamer_index: HashMap<ConnectionId, StreamKey>,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: HashMap::new(),
            viewer_index: HashMap::new(),
            streamer_index: HashMap::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new stream with an empty viewer set
    pub fn register(
        &mut self,
        key: StreamKey,
        streamer: ConnectionId,
        metadata: Metadata,
    ) -> Result<&StreamEntry, RegistryError> {
        if key.is_reserved_for_other(streamer) {
            return Err(RegistryError::ReservedKey(key));
        }
        if self.streams.contains_key(&key) {
            return Err(RegistryError::DuplicateKey(key));
        }
        if let Some(owned) = self.streamer_index.get(&streamer) {
            return Err(RegistryError::AlreadyStreaming(owned.clone()));
        }
        if self.config.max_streams > 0 && self.streams.len() >= self.config.max_streams {
            return Err(RegistryError::CapacityReached(self.config.max_streams));
        }

        tracing::info!(stream = %key, streamer = %streamer, "Stream registered");

        self.streamer_index.insert(streamer, key.clone());
        let entry = self
            .streams
            .entry(key.clone())
            .or_insert_with(|| StreamEntry::new(key, streamer, metadata));
        Ok(entry)
    }

    /// Remove a stream and every index entry pointing at it
    ///
    /// Viewers are not notified here; the caller does that first.
    pub fn unregister(&mut self, key: &StreamKey) -> Result<StreamEntry, RegistryError> {
        let entry = self
            .streams
            .remove(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;

        for viewer in &entry.viewers {
            self.viewer_index.remove(viewer);
        }
        if self.streamer_index.get(&entry.streamer) == Some(key) {
            self.streamer_index.remove(&entry.streamer);
        }

        tracing::info!(
            stream = %key,
            viewers = entry.viewer_count(),
            uptime_secs = entry.started_at.elapsed().as_secs(),
            "Stream unregistered"
        );

        Ok(entry)
    }

    /// Stream owned by a streamer connection
    pub fn find_by_streamer(&self, streamer: ConnectionId) -> Option<&StreamEntry> {
        self.streamer_index
            .get(&streamer)
            .and_then(|key| self.streams.get(key))
    }

    /// Add a viewer to a stream, returning the new viewer count
    ///
    /// Adding a viewer that is already present leaves the count unchanged.
    /// A viewer recorded on a different stream is moved off it, so one
    /// connection never watches two streams.
    pub fn add_viewer(
        &mut self,
        key: &StreamKey,
        viewer: ConnectionId,
    ) -> Result<usize, RegistryError> {
        let limit = self.config.max_viewers_per_stream;
        let entry = self
            .streams
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;

        if entry.has_viewer(viewer) {
            return Ok(entry.viewer_count());
        }
        if limit > 0 && entry.viewer_count() >= limit {
            return Err(RegistryError::ViewerLimitReached(key.clone()));
        }

        if let Some(previous) = self.viewer_index.get(&viewer).cloned() {
            self.remove_viewer(&previous, viewer)?;
        }

        let entry = self
            .streams
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        entry.viewers.insert(viewer);
        self.viewer_index.insert(viewer, key.clone());

        tracing::debug!(
            stream = %key,
            viewer = %viewer,
            viewers = entry.viewer_count(),
            "Viewer added"
        );

        Ok(entry.viewer_count())
    }

    /// Remove a viewer from a stream, returning the remaining viewer count
    pub fn remove_viewer(
        &mut self,
        key: &StreamKey,
        viewer: ConnectionId,
    ) -> Result<usize, RegistryError> {
        let entry = self
            .streams
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;

        if entry.viewers.remove(&viewer) {
            self.viewer_index.remove(&viewer);

            tracing::debug!(
                stream = %key,
                viewer = %viewer,
                viewers = entry.viewer_count(),
                "Viewer removed"
            );
        }

        Ok(entry.viewer_count())
    }

    /// Snapshot of every active stream, ordered by key
    pub fn list_active(&self) -> Vec<StreamSummary> {
        let mut streams: Vec<_> = self.streams.values().map(StreamEntry::summary).collect();
        streams.sort_by(|a, b| a.stream_key.cmp(&b.stream_key));
        streams
    }

    /// Get a stream by key
    pub fn get(&self, key: &StreamKey) -> Option<&StreamEntry> {
        self.streams.get(key)
    }

    /// Stream a connection is currently watching
    pub fn viewing(&self, viewer: ConnectionId) -> Option<&StreamKey> {
        self.viewer_index.get(&viewer)
    }

    /// Current role of a connection
    ///
    /// Streaming takes precedence should a connection somehow hold both.
    pub fn role_of(&self, conn: ConnectionId) -> SessionRole {
        if let Some(key) = self.streamer_index.get(&conn) {
            SessionRole::Streaming(key.clone())
        } else if let Some(key) = self.viewer_index.get(&conn) {
            SessionRole::Viewing(key.clone())
        } else {
            SessionRole::Idle
        }
    }

    /// Get total number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Number of viewers across all streams
    pub fn viewer_total(&self) -> usize {
        self.viewer_index.len()
    }

    /// Assert that the streams and both indexes agree
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut memberships = 0;
        for (key, entry) in &self.streams {
            assert_eq!(&entry.key, key);
            assert_eq!(self.streamer_index.get(&entry.streamer), Some(key));
            for viewer in &entry.viewers {
                assert_eq!(self.viewer_index.get(viewer), Some(key));
                memberships += 1;
            }
        }
        assert_eq!(memberships, self.viewer_index.len());
        for (viewer, key) in &self.viewer_index {
            let entry = self.streams.get(key).expect("membership points at missing stream");
            assert!(entry.has_viewer(*viewer));
        }
        assert_eq!(self.streamer_index.len(), self.streams.len());
    }
}
