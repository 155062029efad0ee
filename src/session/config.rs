//! Session configuration

use crate::registry::RegistryConfig;

/// Policy knobs for the [`SessionManager`](super::SessionManager)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reply `join-failed` when a join cannot be honored instead of
    /// dropping it silently
    pub report_join_failures: bool,

    /// Limits for the registry the manager constructs
    pub registry: RegistryConfig,
}

impl SessionConfig {
    /// Report failed joins to the requester
    pub fn report_join_failures(mut self, enabled: bool) -> Self {
        self.report_join_failures = enabled;
        self
    }

    /// Set registry limits
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}
