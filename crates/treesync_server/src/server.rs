//! The serving peer: accept loop and local watch broadcast.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::registry::ConnectionRegistry;
use crate::session::run_session;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use treesync_engine::{change_for_event, spawn_watcher, Applier, HashCache};

/// Shared state every session task works against.
pub(crate) struct ServerContext {
    /// Live peer connections.
    pub(crate) registry: ConnectionRegistry,
    /// Echo suppressor for the server's own root.
    pub(crate) cache: HashCache,
    /// Applies remote changes to the shared tree.
    pub(crate) applier: Applier,
}

/// The serving peer.
///
/// Owns the listening socket and the shared tree. Each accepted
/// connection gets a snapshot of the tree, then participates in the
/// relay: changes received from one peer are applied locally and fanned
/// out to all others, and changes detected in the server's own root are
/// fanned out to everyone.
pub struct SyncServer {
    config: ServerConfig,
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl SyncServer {
    /// Creates the shared root if needed and binds the listening socket.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        fs::create_dir_all(&config.root)?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            root = %config.root.display(),
            "listening"
        );

        let ctx = Arc::new(ServerContext {
            registry: ConnectionRegistry::new(),
            cache: HashCache::new(),
            applier: Applier::new(&config.root),
        });

        Ok(Self {
            config,
            listener,
            ctx,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        self.ctx.registry.len()
    }

    /// Accepts and serves peers until the task is dropped.
    pub async fn run(&self) -> ServerResult<()> {
        let (mut fs_events, _watch) = spawn_watcher(self.config.root.clone())?;
        let watch_ctx = Arc::clone(&self.ctx);
        let root = self.config.root.clone();
        let _watch_task = tokio::spawn(async move {
            while let Some(event) = fs_events.recv().await {
                if let Some(change) = change_for_event(&root, &watch_ctx.cache, event) {
                    debug!(
                        action = change.action(),
                        path = change.path(),
                        "broadcasting local change"
                    );
                    if let Err(e) = watch_ctx.registry.broadcast(&change, None) {
                        warn!(error = %e, "failed to encode local change");
                    }
                }
            }
        });

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if self.ctx.registry.len() >= self.config.max_peers {
                        warn!(%addr, max = self.config.max_peers, "refusing peer, limit reached");
                        continue;
                    }
                    tokio::spawn(run_session(stream, addr, Arc::clone(&self.ctx)));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    /// Drops every peer connection. The accept loop itself stops when the
    /// task running [`SyncServer::run`] is dropped.
    pub fn shutdown(&self) {
        info!(peers = self.peer_count(), "closing all connections");
        self.ctx.registry.clear();
    }
}
