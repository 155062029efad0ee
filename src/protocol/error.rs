//! Protocol decode errors

/// Error raised when an inbound frame cannot be turned into a [`ClientEvent`](super::ClientEvent)
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not a JSON envelope, or its payload has the wrong shape
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope names an event this server does not handle
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Event requires a payload but `data` was absent
    #[error("Missing data for event: {0}")]
    MissingData(&'static str),
}
