//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::hub::DEFAULT_QUEUE_CAPACITY;
use crate::session::SessionConfig;

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Largest inbound WebSocket message accepted, in bytes
    pub max_message_size: usize,

    /// Outbound frames buffered per connection before new ones are dropped
    pub send_queue_capacity: usize,

    /// Session policy and registry limits
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Negotiation is latency sensitive
            max_message_size: 256 * 1024,
            send_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Build a config from `PORT`, `BIND_ADDR` and `MAX_CONNECTIONS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("BIND_ADDR") {
            let ip: IpAddr = host
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("BIND_ADDR is not an IP address: {}", host)))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", port)))?;
            config.bind_addr.set_port(port);
        }
        if let Some(max) = lookup("MAX_CONNECTIONS") {
            config.max_connections = max.trim().parse().map_err(|_| {
                Error::Config(format!("MAX_CONNECTIONS is not a number: {}", max))
            })?;
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the inbound message size limit
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the per-connection outbound queue size
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    /// Set session policy
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
