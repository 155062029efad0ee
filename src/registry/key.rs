//! Stream identity
//!
//! A stream is identified by a key chosen by its streamer (the username it
//! announces with) or generated from the streamer's connection id.
//! Generated keys live under [`GENERATED_PREFIX`], which usernames may not
//! claim.

use serde::{Deserialize, Serialize};

use crate::hub::ConnectionId;

/// Prefix of keys handed out to streamers without a username
pub const GENERATED_PREFIX: &str = "stream-";

/// Unique identifier for an active stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Create a stream key from any string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a streamer that did not announce a name
    pub fn generated(streamer: ConnectionId) -> Self {
        Self(format!("{}{}", GENERATED_PREFIX, streamer))
    }

    /// Whether this key lies in the generated namespace but does not belong
    /// to `streamer`
    pub fn is_reserved_for_other(&self, streamer: ConnectionId) -> bool {
        self.0.starts_with(GENERATED_PREFIX) && *self != Self::generated(streamer)
    }

    /// Pick the key for a start-stream request
    ///
    /// A non-blank username wins (surrounding whitespace is dropped);
    /// anything else falls back to [`StreamKey::generated`].
    pub fn for_streamer(username: Option<&str>, streamer: ConnectionId) -> Self {
        match username.map(str::trim) {
            Some(name) if !name.is_empty() => Self::new(name),
            _ => Self::generated(streamer),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
