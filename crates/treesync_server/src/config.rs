//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the serving peer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// The shared directory served to joining peers.
    pub root: PathBuf,
    /// Maximum concurrent peer connections.
    pub max_peers: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            root: root.into(),
            max_peers: 64,
        }
    }

    /// Sets the maximum concurrent peer connections.
    pub fn with_max_peers(mut self, max: usize) -> Self {
        self.max_peers = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 9000)), "./shared")
    }
}
