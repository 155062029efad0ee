//! Registry configuration

/// Limits applied by the [`StreamRegistry`](super::StreamRegistry)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum concurrent streams (0 = unlimited)
    pub max_streams: usize,

    /// Maximum viewers on a single stream (0 = unlimited)
    pub max_viewers_per_stream: usize,
}

impl RegistryConfig {
    /// Set maximum concurrent streams
    pub fn max_streams(mut self, max: usize) -> Self {
        self.max_streams = max;
        self
    }

    /// Set maximum viewers per stream
    pub fn max_viewers_per_stream(mut self, max: usize) -> Self {
        self.max_viewers_per_stream = max;
        self
    }
}
