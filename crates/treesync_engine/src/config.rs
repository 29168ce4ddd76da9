//! Client configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for a joining peer.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address of the serving peer.
    pub server_addr: SocketAddr,
    /// Local directory to keep in sync.
    pub root: PathBuf,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(server_addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            server_addr,
            root: root.into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 9000)), "./local")
    }
}
