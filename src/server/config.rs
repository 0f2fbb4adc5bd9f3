//! Server configuration

use std::net::SocketAddr;

/// HTTP server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Stop every active stream when a graceful shutdown completes, so
    /// parked producers and consumers are released instead of riding out
    /// their windows
    pub stop_streams_on_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            stop_streams_on_shutdown: true,
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

    /// Keep streams running across a graceful shutdown
    pub fn keep_streams_on_shutdown(mut self) -> Self {
        self.stop_streams_on_shutdown = false;
        self
    }
}
