//! Stream registry
//!
//! The registry is the directory of who is streaming and who is watching.
//!
//! # Layout
//!
//! ```text
//!                StreamRegistry
//!   ┌───────────────────────────────────────────┐
//!   │ streams:        HashMap<StreamKey,        │
//!   │                   StreamEntry {           │
//!   │                     streamer,             │
//!   │                     metadata,             │
//!   │                     viewers: HashSet,     │
//!   │                   }>                      │
//!   │ viewer_index:   HashMap<ConnId, StreamKey>│
//!   │ streamer_index: HashMap<ConnId, StreamKey>│
//!   └───────────────────────────────────────────┘
//! ```
//!
//! `viewer_index[v] == k` holds exactly when `v` is in `streams[k].viewers`,
//! and `streamer_index[s] == k` exactly when `streams[k].streamer == s`.

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{StreamEntry, StreamSummary};
pub use error::RegistryError;
pub use key::StreamKey;
pub use store::StreamRegistry;
