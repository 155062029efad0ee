//! WebSocket signaling server
//!
//! Accepts TCP connections, upgrades them to WebSocket and bridges frames
//! to the session layer. Any origin may connect.

pub mod config;
mod connection;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use listener::SignalingServer;
