//! Live peer connections and broadcast fan-out.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use treesync_protocol::{encode_line, ChangeEvent, ProtocolResult, WireMessage};

/// Identity of a registered peer connection, unique per process.
pub type PeerId = u64;

/// The registry's non-owning handle to one peer: where to queue outbound
/// lines. The session task owns the socket itself.
#[derive(Debug)]
struct PeerHandle {
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<String>,
}

/// The set of live peer connections.
///
/// All mutation and iteration happens under a single lock; broadcast only
/// queues lines on per-peer channels, so the lock is never held across
/// socket I/O.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and returns its identity. Called once per
    /// accepted socket.
    pub fn register(&self, addr: SocketAddr, outbound: mpsc::UnboundedSender<String>) -> PeerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.peers.lock().insert(id, PeerHandle { addr, outbound });
        debug!(peer = id, %addr, "registered");
        id
    }

    /// Removes a connection. Removing an already-absent connection is a
    /// no-op.
    pub fn unregister(&self, id: PeerId) {
        if let Some(handle) = self.peers.lock().remove(&id) {
            debug!(peer = id, addr = %handle.addr, "unregistered");
        }
    }

    /// Encodes `event` once and queues it on every registered peer except
    /// `excluding` (the originator).
    ///
    /// A peer whose outbound queue is gone is removed from the registry
    /// without aborting delivery to the others. Returns the number of
    /// peers the event was delivered to.
    pub fn broadcast(
        &self,
        event: &ChangeEvent,
        excluding: Option<PeerId>,
    ) -> ProtocolResult<usize> {
        let line = encode_line(&WireMessage::Change(event.clone()))?;

        let mut peers = self.peers.lock();
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (&id, handle) in peers.iter() {
            if Some(id) == excluding {
                continue;
            }
            if handle.outbound.send(line.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }
        for id in dead {
            if let Some(handle) = peers.remove(&id) {
                warn!(peer = id, addr = %handle.addr, "dropping unreachable peer");
            }
        }
        Ok(delivered)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Returns true if no peers are connected.
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Drops every connection's outbound queue, ending all writer tasks.
    pub fn clear(&self) {
        self.peers.lock().clear();
    }
}
