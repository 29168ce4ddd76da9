//! The joining side's peer session.

use crate::applier::Applier;
use crate::config::ClientConfig;
use crate::error::{EngineError, EngineResult};
use crate::hash_cache::HashCache;
use crate::session::SessionState;
use crate::snapshot::apply_snapshot;
use crate::watcher::{change_for_event, spawn_watcher};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use treesync_protocol::{decode_line, encode_line, WireMessage};

/// A peer session that joins a serving peer.
///
/// Connects, installs the initial snapshot, then streams: remote changes
/// are applied to the local tree, locally detected novel changes are sent
/// to the server. The session ends when the stream closes or a protocol
/// error makes the connection unusable.
pub struct SyncClient {
    config: ClientConfig,
    cache: Arc<HashCache>,
    state: Mutex<SessionState>,
}

impl SyncClient {
    /// Creates a client for the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            cache: Arc::new(HashCache::new()),
            state: Mutex::new(SessionState::Connecting),
        }
    }

    /// The session's current state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// The session's echo-suppression cache.
    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "session state");
        *self.state.lock() = state;
    }

    /// Runs the session to completion. The session always ends in the
    /// `Closed` state, whatever the outcome.
    pub async fn run(&self) -> EngineResult<()> {
        let result = self.run_inner().await;
        self.set_state(SessionState::Closed);
        result
    }

    async fn run_inner(&self) -> EngineResult<()> {
        let root = self.config.root.clone();
        fs::create_dir_all(&root).map_err(EngineError::Network)?;

        let stream = TcpStream::connect(self.config.server_addr).await?;
        info!(server = %self.config.server_addr, root = %root.display(), "connected");

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let applier = Applier::new(&root);

        // Handshake: the first message on the stream must be the
        // server's snapshot, applied before we watch or send anything.
        self.set_state(SessionState::SyncingInitial);
        let first = lines.next_line().await?.ok_or_else(|| {
            EngineError::Handshake("connection closed before snapshot".to_string())
        })?;
        match decode_line(&first)? {
            WireMessage::Snapshot(snapshot) => {
                let installed = apply_snapshot(&applier, &self.cache, &snapshot);
                info!(files = installed, "initial sync complete");
            }
            WireMessage::Change(_) => {
                return Err(EngineError::Handshake(
                    "expected snapshot as first message".to_string(),
                ));
            }
        }

        self.set_state(SessionState::Streaming);
        let (mut fs_events, _watch) = spawn_watcher(root.clone())?;

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Err(e) = self.handle_remote_line(&applier, &line) {
                            break Err(e);
                        }
                    }
                    Ok(None) => {
                        info!("server closed the connection");
                        break Ok(());
                    }
                    Err(e) => break Err(EngineError::Network(e)),
                },
                event = fs_events.recv() => match event {
                    Some(event) => {
                        if let Some(change) = change_for_event(&root, &self.cache, event) {
                            debug!(action = change.action(), path = change.path(), "sending");
                            let mut line = encode_line(&change.into())?;
                            line.push('\n');
                            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                                break Err(EngineError::Network(e));
                            }
                        }
                    }
                    None => break Ok(()),
                },
            }
        }
    }

    fn handle_remote_line(&self, applier: &Applier, line: &str) -> EngineResult<()> {
        match decode_line(line)? {
            WireMessage::Snapshot(_) => Err(EngineError::Handshake(
                "unexpected snapshot after handshake".to_string(),
            )),
            WireMessage::Change(event) => {
                match applier.apply(&event) {
                    Ok(_) => self.cache.record_applied(&event),
                    // The change is dropped; the session keeps running.
                    Err(e) => warn!(
                        action = event.action(),
                        path = event.path(),
                        error = %e,
                        "failed to apply remote change"
                    ),
                }
                Ok(())
            }
        }
    }
}
