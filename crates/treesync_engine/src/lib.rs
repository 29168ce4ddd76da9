//! # Treesync Engine
//!
//! Echo suppression, change application and the client session for
//! treesync.
//!
//! This crate provides:
//! - `HashCache` for suppressing echoes of our own writes
//! - `Applier` for idempotent, atomic change application
//! - Snapshot scanning and installation for the initial sync handshake
//! - A `notify`-backed filesystem watch adapter
//! - `SyncClient`, the joining side's peer session
//!
//! ## Echo suppression
//!
//! Applying a remote change to the local tree triggers a local watch
//! notification for the same content. Without a guard this notification
//! would be re-encoded and re-sent, and the change would circulate
//! between peers forever. The hash cache remembers the fingerprint of the
//! last content this process sent or applied per path; a watch
//! notification whose content matches the cached fingerprint is an echo
//! and is dropped.
//!
//! ## Key invariants
//!
//! - Every applied write is recorded in the cache before the watcher can
//!   observe it being re-read
//! - Delete and rename maintain the cache symmetrically on both the send
//!   and the apply path, so entries never leak
//! - Changes from one connection apply in arrival order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod client;
mod config;
mod error;
mod hash_cache;
mod relpath;
mod session;
mod snapshot;
mod watcher;

pub use applier::{Applier, ApplyOutcome};
pub use client::SyncClient;
pub use config::ClientConfig;
pub use error::{ApplyError, ApplyResult, EngineError, EngineResult};
pub use hash_cache::HashCache;
pub use session::SessionState;
pub use snapshot::{apply_snapshot, scan_tree};
pub use watcher::{change_for_event, is_ignored, spawn_watcher, FsEvent, WatcherHandle};
