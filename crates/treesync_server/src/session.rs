//! Per-connection peer sessions on the serving side.

use crate::registry::PeerId;
use crate::server::ServerContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use treesync_engine::{scan_tree, SessionState};
use treesync_protocol::{decode_line, encode_line, WireMessage};

/// Runs one peer connection to completion: snapshot handshake, then the
/// read/apply/rebroadcast loop. On exit the connection is unregistered
/// and every session resource is released.
pub(crate) async fn run_session(stream: TcpStream, addr: SocketAddr, ctx: Arc<ServerContext>) {
    let mut state = SessionState::Connecting;
    debug!(%addr, ?state, "session state");

    let (read_half, mut write_half) = stream.into_split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    // Snapshot handshake: queue the full tree as the first line, then
    // register. The writer drains the queue in order, so no broadcast
    // can precede the snapshot on this stream.
    state = SessionState::SyncingInitial;
    debug!(%addr, ?state, "session state");
    let snapshot = match scan_tree(ctx.applier.root()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(%addr, error = %e, "failed to scan shared tree, dropping connection");
            return;
        }
    };
    let file_count = snapshot.len();
    let snapshot_line = match encode_line(&WireMessage::Snapshot(snapshot)) {
        Ok(line) => line,
        Err(e) => {
            warn!(%addr, error = %e, "failed to encode snapshot, dropping connection");
            return;
        }
    };
    if outbound.send(snapshot_line).is_err() {
        return;
    }
    let id = ctx.registry.register(addr, outbound);
    info!(peer = id, %addr, files = file_count, "peer joined");

    let writer = tokio::spawn(async move {
        while let Some(mut line) = outbound_rx.recv().await {
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    state = SessionState::Streaming;
    debug!(peer = id, ?state, "session state");
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !handle_line(&ctx, id, &line) {
                    break;
                }
            }
            Ok(None) => {
                info!(peer = id, "peer disconnected");
                break;
            }
            Err(e) => {
                warn!(peer = id, error = %e, "read error");
                break;
            }
        }
    }

    state = SessionState::Closed;
    debug!(peer = id, ?state, "session state");
    ctx.registry.unregister(id);
    writer.abort();
}

/// Processes one inbound line. Returns false when the connection must
/// close.
fn handle_line(ctx: &ServerContext, id: PeerId, line: &str) -> bool {
    let event = match decode_line(line) {
        Ok(WireMessage::Change(event)) => event,
        Ok(WireMessage::Snapshot(_)) => {
            warn!(peer = id, "unexpected snapshot after handshake, closing connection");
            return false;
        }
        Err(e) => {
            warn!(peer = id, error = %e, "protocol error, closing connection");
            return false;
        }
    };

    match ctx.applier.apply(&event) {
        Ok(_) => {
            ctx.cache.record_applied(&event);
            debug!(
                peer = id,
                action = event.action(),
                path = event.path(),
                "applied, relaying"
            );
            match ctx.registry.broadcast(&event, Some(id)) {
                Ok(delivered) => debug!(peer = id, delivered, "relayed"),
                Err(e) => warn!(peer = id, error = %e, "failed to encode for relay"),
            }
        }
        // The change is dropped; the session keeps running.
        Err(e) => warn!(
            peer = id,
            action = event.action(),
            path = event.path(),
            error = %e,
            "failed to apply change"
        ),
    }
    true
}
