//! Integration tests driving the serving peer over real sockets.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use treesync_engine::{ClientConfig, SessionState, SyncClient};
use treesync_protocol::{decode_line, encode_line, ChangeEvent, SnapshotMessage, WireMessage};
use treesync_server::{ServerConfig, SyncServer};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const CONVERGE_TIMEOUT: Duration = Duration::from_secs(10);

async fn start_server(root: &Path) -> (SocketAddr, Arc<SyncServer>) {
    start_server_with(ServerConfig::new("127.0.0.1:0".parse().unwrap(), root)).await
}

async fn start_server_with(mut config: ServerConfig) -> (SocketAddr, Arc<SyncServer>) {
    config.bind_addr = "127.0.0.1:0".parse().unwrap();
    let server = Arc::new(SyncServer::bind(config).await.unwrap());
    let addr = server.local_addr().unwrap();
    let runner = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = runner.run().await;
    });
    (addr, server)
}

/// A hand-driven peer speaking the wire protocol directly.
struct RawPeer {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl RawPeer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Reads the next message, or `None` on end of stream.
    async fn recv(&mut self) -> Option<WireMessage> {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a message")
            .expect("read error")?;
        Some(decode_line(&line).expect("peer sent an undecodable line"))
    }

    async fn expect_snapshot(&mut self) -> SnapshotMessage {
        match self.recv().await {
            Some(WireMessage::Snapshot(snapshot)) => snapshot,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    async fn expect_change(&mut self) -> ChangeEvent {
        match self.recv().await {
            Some(WireMessage::Change(event)) => event,
            other => panic!("expected change, got {other:?}"),
        }
    }

    async fn expect_eof(&mut self) {
        assert!(self.recv().await.is_none(), "expected the stream to close");
    }

    async fn expect_silence(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.lines.next_line()).await;
        assert!(result.is_err(), "expected no traffic, got {result:?}");
    }

    async fn send(&mut self, event: ChangeEvent) {
        let mut line = encode_line(&event.into()).unwrap();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }
}

/// Polls until `check` passes or the convergence timeout elapses.
async fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + CONVERGE_TIMEOUT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn file_equals(path: &Path, expected: &str) -> bool {
    fs::read_to_string(path).map(|c| c == expected).unwrap_or(false)
}

#[tokio::test]
async fn snapshot_is_the_first_message() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    fs::create_dir_all(dir.path().join("notes")).unwrap();
    fs::write(dir.path().join("notes/b.txt"), "beta").unwrap();
    let (addr, _server) = start_server(dir.path()).await;

    let mut peer = RawPeer::connect(addr).await;
    let snapshot = peer.expect_snapshot().await;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("a.txt"), Some("alpha"));
    assert_eq!(snapshot.get("notes/b.txt"), Some("beta"));
}

#[tokio::test]
async fn relay_reaches_everyone_but_the_originator() {
    let dir = TempDir::new().unwrap();
    let (addr, server) = start_server(dir.path()).await;

    let mut a = RawPeer::connect(addr).await;
    let mut b = RawPeer::connect(addr).await;
    let mut c = RawPeer::connect(addr).await;
    a.expect_snapshot().await;
    b.expect_snapshot().await;
    c.expect_snapshot().await;
    assert_eq!(server.peer_count(), 3);

    let event = ChangeEvent::create("notes/a.txt", "hello");
    a.send(event.clone()).await;

    assert_eq!(b.expect_change().await, event);
    assert_eq!(c.expect_change().await, event);
    // The originator never hears its own change back.
    a.expect_silence(Duration::from_millis(400)).await;

    // The relay also applied the change to its own tree.
    wait_for("server tree to contain notes/a.txt", || {
        file_equals(&dir.path().join("notes/a.txt"), "hello")
    })
    .await;
}

#[tokio::test]
async fn malformed_line_closes_only_the_offender() {
    let dir = TempDir::new().unwrap();
    let (addr, server) = start_server(dir.path()).await;

    let mut offender = RawPeer::connect(addr).await;
    let mut sender = RawPeer::connect(addr).await;
    let mut receiver = RawPeer::connect(addr).await;
    offender.expect_snapshot().await;
    sender.expect_snapshot().await;
    receiver.expect_snapshot().await;

    offender.send_raw("this is not a wire record").await;
    offender.expect_eof().await;
    wait_for("offender to be unregistered", || server.peer_count() == 2).await;

    // The other sessions are unaffected.
    let event = ChangeEvent::create("still-works.txt", "yes");
    sender.send(event.clone()).await;
    assert_eq!(receiver.expect_change().await, event);
}

#[tokio::test]
async fn snapshot_after_handshake_is_a_protocol_error() {
    let dir = TempDir::new().unwrap();
    let (addr, _server) = start_server(dir.path()).await;

    let mut peer = RawPeer::connect(addr).await;
    peer.expect_snapshot().await;

    peer.send_raw(r#"{"sync": true, "files": {}}"#).await;
    peer.expect_eof().await;
}

#[tokio::test]
async fn failed_apply_drops_the_change_but_keeps_the_session() {
    let dir = TempDir::new().unwrap();
    // A plain file where a directory would be needed makes the apply fail.
    fs::write(dir.path().join("blocker"), "i am a file").unwrap();
    let (addr, _server) = start_server(dir.path()).await;

    let mut sender = RawPeer::connect(addr).await;
    let mut receiver = RawPeer::connect(addr).await;
    sender.expect_snapshot().await;
    receiver.expect_snapshot().await;

    sender
        .send(ChangeEvent::create("blocker/child.txt", "cannot land"))
        .await;
    sender
        .send(ChangeEvent::create("ok.txt", "still alive"))
        .await;

    // The failed change is dropped entirely; the next one flows through.
    let event = receiver.expect_change().await;
    assert_eq!(event, ChangeEvent::create("ok.txt", "still alive"));
    assert!(file_equals(&dir.path().join("ok.txt"), "still alive"));
}

#[tokio::test]
async fn peer_limit_refuses_excess_connections() {
    let dir = TempDir::new().unwrap();
    let config =
        ServerConfig::new("127.0.0.1:0".parse().unwrap(), dir.path()).with_max_peers(1);
    let (addr, server) = start_server_with(config).await;

    let mut first = RawPeer::connect(addr).await;
    first.expect_snapshot().await;
    wait_for("first peer to register", || server.peer_count() == 1).await;

    let mut second = RawPeer::connect(addr).await;
    second.expect_eof().await;
    assert_eq!(server.peer_count(), 1);
}

#[tokio::test]
async fn joined_clients_converge() {
    let server_root = TempDir::new().unwrap();
    let a_root = TempDir::new().unwrap();
    let b_root = TempDir::new().unwrap();
    let (addr, _server) = start_server(server_root.path()).await;

    let a = Arc::new(SyncClient::new(ClientConfig::new(addr, a_root.path())));
    let b = Arc::new(SyncClient::new(ClientConfig::new(addr, b_root.path())));
    for client in [&a, &b] {
        let client = Arc::clone(client);
        tokio::spawn(async move {
            let _ = client.run().await;
        });
    }
    wait_for("both clients to reach streaming", || {
        a.state() == SessionState::Streaming && b.state() == SessionState::Streaming
    })
    .await;
    // Let the watchers arm before mutating the trees.
    tokio::time::sleep(Duration::from_millis(300)).await;

    // A change in one replica reaches the other and the relay.
    fs::write(a_root.path().join("greeting.txt"), "hello").unwrap();
    wait_for("b to receive greeting.txt", || {
        file_equals(&b_root.path().join("greeting.txt"), "hello")
    })
    .await;
    wait_for("relay to hold greeting.txt", || {
        file_equals(&server_root.path().join("greeting.txt"), "hello")
    })
    .await;

    // A rename converges: the old name disappears, content survives.
    fs::rename(
        a_root.path().join("greeting.txt"),
        a_root.path().join("renamed.txt"),
    )
    .unwrap();
    wait_for("b to apply the rename", || {
        file_equals(&b_root.path().join("renamed.txt"), "hello")
            && !b_root.path().join("greeting.txt").exists()
    })
    .await;

    // And the other direction: an edit in b's replica flows back to a.
    fs::write(b_root.path().join("renamed.txt"), "v2").unwrap();
    wait_for("a to receive the edit", || {
        file_equals(&a_root.path().join("renamed.txt"), "v2")
    })
    .await;

    // Echo suppression: a's own tree kept exactly the converged state.
    assert!(!a_root.path().join("greeting.txt").exists());
}

#[tokio::test]
async fn late_joiner_receives_the_current_tree() {
    let server_root = TempDir::new().unwrap();
    let (addr, _server) = start_server(server_root.path()).await;

    let mut early = RawPeer::connect(addr).await;
    assert!(early.expect_snapshot().await.is_empty());

    early
        .send(ChangeEvent::create("made-early.txt", "before you joined"))
        .await;
    wait_for("relay to apply the early change", || {
        file_equals(&server_root.path().join("made-early.txt"), "before you joined")
    })
    .await;

    let mut late = RawPeer::connect(addr).await;
    let snapshot = late.expect_snapshot().await;
    assert_eq!(snapshot.get("made-early.txt"), Some("before you joined"));
}
