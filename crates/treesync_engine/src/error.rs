//! Error types for the sync engine.

use thiserror::Error;
use treesync_protocol::ProtocolError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for change application.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// I/O failure while applying a single change to the local tree.
///
/// Apply errors are never fatal to a session: the owning session logs
/// them and drops the individual change.
#[derive(Error, Debug)]
pub enum ApplyError {
    /// The event carried a path that escapes the synchronized root.
    #[error(transparent)]
    UnsafePath(#[from] ProtocolError),

    /// Filesystem I/O failed.
    #[error("{action} failed for `{path}`: {source}")]
    Io {
        /// What the applier was doing.
        action: &'static str,
        /// The wire path being applied.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ApplyError {
    pub(crate) fn io(action: &'static str, path: &str, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_string(),
            source,
        }
    }
}

/// Errors that can occur in a client session.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed wire record; fatal for the owning connection.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The handshake did not follow the snapshot-first contract.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Send/receive failure on the connection.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// The filesystem watch adapter could not be started.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
