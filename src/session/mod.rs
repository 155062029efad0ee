//! Session lifecycle
//!
//! Join, leave, start, stop and disconnect handling on top of the stream
//! registry, plus the notifications each transition emits.

pub mod config;
pub mod manager;
pub mod state;

pub use config::SessionConfig;
pub use manager::SessionManager;
pub use state::SessionRole;
