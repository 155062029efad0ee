//! Per-connection session role
//!
//! A connection starts idle, becomes a streamer after a successful
//! start-stream or a viewer after a successful join, and returns to idle on
//! leave, stop or disconnect. The role is derived from the registry rather
//! than stored alongside it.

use crate::registry::StreamKey;

/// What a connection is currently doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRole {
    /// Neither streaming nor viewing
    Idle,
    /// Broadcasting the given stream
    Streaming(StreamKey),
    /// Watching the given stream
    Viewing(StreamKey),
}

impl SessionRole {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionRole::Idle)
    }

    /// Stream the role is tied to, if any
    pub fn stream_key(&self) -> Option<&StreamKey> {
        match self {
            SessionRole::Idle => None,
            SessionRole::Streaming(key) | SessionRole::Viewing(key) => Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_accessors() {
        assert!(SessionRole::Idle.is_idle());
        assert_eq!(SessionRole::Idle.stream_key(), None);

        let key = StreamKey::new("live");
        let role = SessionRole::Viewing(key.clone());
        assert!(!role.is_idle());
        assert_eq!(role.stream_key(), Some(&key));
    }
}
