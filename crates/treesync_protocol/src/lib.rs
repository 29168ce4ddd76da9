//! # Treesync Protocol
//!
//! Wire protocol types and line codecs for treesync.
//!
//! This crate provides:
//! - `ChangeEvent` for filesystem mutation records
//! - `SnapshotMessage` for the initial sync handshake
//! - Newline-delimited JSON encoding/decoding
//! - Relative-path safety validation
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod error;
pub mod paths;
mod snapshot;
mod wire;

pub use change::ChangeEvent;
pub use error::{ProtocolError, ProtocolResult};
pub use snapshot::SnapshotMessage;
pub use wire::{decode_line, encode_line, WireMessage};
