//! Peer session lifecycle.

/// The state of one peer session.
///
/// Transitions are one-directional: `Connecting → SyncingInitial →
/// Streaming → Closed`. There is no recovery from `Closed`; a peer
/// re-establishes a fresh connection and repeats the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket established, no data exchanged yet.
    Connecting,
    /// Snapshot being transferred and applied.
    SyncingInitial,
    /// Steady state: reading, applying and relaying live change events.
    Streaming,
    /// Stream ended or errored; resources released.
    Closed,
}

impl SessionState {
    /// Returns true while the connection is usable.
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }

    /// Returns true once the handshake has completed.
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }
}
