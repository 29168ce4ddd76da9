//! # Treesync Server
//!
//! The serving peer for treesync: accepts joining peers over TCP, sends
//! each a full snapshot of the shared tree, then relays every change to
//! all other connected peers.
//!
//! # Architecture
//!
//! One reader task and one writer task per connection, plus one watch
//! task for the server's own root. The connection registry is the single
//! shared-state domain: every broadcast iterates it under one lock, and
//! removing a connection from it is the only way a session ends its
//! membership.
//!
//! # Failure isolation
//!
//! - A malformed line closes the offending connection only
//! - A failed filesystem apply drops that one change only
//! - A dead peer discovered during broadcast is evicted without
//!   disturbing delivery to the rest

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod registry;
mod server;
mod session;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use registry::{ConnectionRegistry, PeerId};
pub use server::SyncServer;
