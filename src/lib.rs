//! Rendezvous and signaling relay for peer-to-peer live streams
//!
//! A streamer announces a stream, viewers discover and join it, and the
//! server forwards negotiation messages (offers, answers, ICE candidates)
//! between exactly the two peers involved. Media never passes through.
//!
//! ```text
//!  WebSocket ──► server::Connection ──► protocol::ClientEvent
//!                                            │
//!                     ┌──────────────────────┴───────────────┐
//!                     ▼                                      ▼
//!           session::SessionManager                  relay::forward()
//!           (Mutex<StreamRegistry>)                     (stateless)
//!                     │                                      │
//!                     └──────────► hub::Outbound ◄───────────┘
//!                                      │
//!                          per-connection send queues
//! ```

pub mod error;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{ConnectionHub, ConnectionId, Outbound};
pub use registry::{RegistryConfig, StreamKey, StreamRegistry};
pub use server::{ServerConfig, SignalingServer};
pub use session::{SessionConfig, SessionManager, SessionRole};
