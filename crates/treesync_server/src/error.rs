//! Error types for the serving peer.

use thiserror::Error;
use treesync_protocol::ProtocolError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Socket or filesystem I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The filesystem watch adapter could not be started.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A record could not be encoded for the wire.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
