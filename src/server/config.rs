//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3030;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent stream viewers across all cameras (0 = unlimited)
    pub max_viewers: usize,

    /// Serve the HTML index page at `/`
    pub index_page: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_viewers: 0, // Unlimited
            index_page: true,
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

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum concurrent viewers
    pub fn max_viewers(mut self, max: usize) -> Self {
        self.max_viewers = max;
        self
    }

    /// Disable the index page
    pub fn disable_index_page(mut self) -> Self {
        self.index_page = false;
        self
    }
}
