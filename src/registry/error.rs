//! Registry error types
//!
//! Error types for stream registry operations.

use super::key::StreamKey;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A stream with this key is already active
    #[error("Stream key already in use: {0}")]
    DuplicateKey(StreamKey),
    /// The key is generated for a different connection
    #[error("Stream key is reserved: {0}")]
    ReservedKey(StreamKey),
    /// The connection already broadcasts the given stream
    #[error("Connection is already streaming {0}")]
    AlreadyStreaming(StreamKey),
    /// Stream not found
    #[error("Stream not found: {0}")]
    NotFound(StreamKey),
    /// The registry holds `max_streams` streams already
    #[error("Stream limit reached ({0})")]
    CapacityReached(usize),
    /// The stream holds `max_viewers_per_stream` viewers already
    #[error("Viewer limit reached for stream {0}")]
    ViewerLimitReached(StreamKey),
}
