//! Start, stop, drain and restart behaviour.

use std::sync::Arc;
use std::time::Duration;

use async_server::{EchoProtocol, LastAction, Server, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::RecordingEcho;

#[tokio::test]
async fn test_stop_waits_for_live_connections() {
    let (server, addr) = common::start_server(EchoProtocol).await;
    let server = Arc::new(server);

    // Connected but silent: the server is parked in a receive.
    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(common::wait_until(|| server.active_connections() == 1, Duration::from_secs(2)).await);

    let stopping = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.stop().await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!stopping.is_finished(), "stop returned with a live connection");

    client.write_all(b"done\n").await.unwrap();
    let mut reply = Vec::new();
    client.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"done\n");

    tokio::time::timeout(Duration::from_secs(5), stopping)
        .await
        .expect("stop did not finish after drain")
        .unwrap();
    assert_eq!(server.active_connections(), 0);
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_introspection_during_drain() {
    let (server, addr) = common::start_server(EchoProtocol).await;
    let server = Arc::new(server);
    assert!(server.is_running());

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(common::wait_until(|| server.active_connections() == 1, Duration::from_secs(2)).await);

    let stopping = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.stop().await })
    };

    // Stopped accepting right away, still draining the held connection.
    assert!(common::wait_until(|| !server.is_running(), Duration::from_secs(1)).await);
    assert_eq!(server.local_addr(), None);
    assert_eq!(server.active_connections(), 1);
    assert!(!stopping.is_finished());

    client.write_all(b"\n").await.unwrap();
    let mut reply = Vec::new();
    client.read_to_end(&mut reply).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), stopping)
        .await
        .expect("stop did not finish after drain")
        .unwrap();
    assert_eq!(server.active_connections(), 0);
}

#[tokio::test]
async fn test_no_accepts_once_stop_requested() {
    let (server, addr) = common::start_server(RecordingEcho::default()).await;
    let server = Arc::new(server);

    let mut first = TcpStream::connect(addr).await.unwrap();
    assert!(common::wait_until(|| server.active_connections() == 1, Duration::from_secs(2)).await);

    let stopping = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The listener is still open while draining, so the kernel may complete
    // the handshake, but the engine must not hand it to the handler.
    let late = TcpStream::connect(addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.handler().count(LastAction::Accept), 1);

    first.write_all(b"\n").await.unwrap();
    let mut reply = Vec::new();
    first.read_to_end(&mut reply).await.unwrap();
    stopping.await.unwrap();

    assert_eq!(server.handler().count(LastAction::Accept), 1);
    drop(late);
}

#[tokio::test]
async fn test_restart_rebinds_and_serves() {
    let (server, addr) = common::start_server(RecordingEcho::default()).await;
    assert_eq!(common::exchange(addr, &[b"one\n"]).await, b"one\n");

    // Starting again tears down the first generation before rebinding.
    let second = server.start("127.0.0.1:0".parse().unwrap()).await.unwrap();
    assert_eq!(server.local_addr(), Some(second));
    assert_eq!(common::exchange(second, &[b"two\n"]).await, b"two\n");

    server.stop().await;
    assert_eq!(server.handler().count(LastAction::Accept), 2);
    assert_eq!(server.active_connections(), 0);
}

#[tokio::test]
async fn test_restart_on_same_port() {
    let (server, addr) = common::start_server(EchoProtocol).await;
    server.stop().await;

    let again = server.start(addr).await.unwrap();
    assert_eq!(again, addr);
    assert_eq!(common::exchange(addr, &[b"again\n"]).await, b"again\n");
    server.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (server, _addr) = common::start_server(EchoProtocol).await;
    server.stop().await;
    server.stop().await;
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_engines_count_independently() {
    let (a, addr_a) = common::start_server(EchoProtocol).await;
    let (b, _addr_b) = common::start_server(EchoProtocol).await;

    let held = TcpStream::connect(addr_a).await.unwrap();
    assert!(common::wait_until(|| a.active_connections() == 1, Duration::from_secs(2)).await);
    assert_eq!(b.active_connections(), 0);

    // b drains immediately even though a has a live connection.
    tokio::time::timeout(Duration::from_secs(2), b.stop())
        .await
        .expect("idle engine did not stop");
    assert_eq!(a.active_connections(), 1);

    drop(held);
    a.stop().await;
    assert_eq!(a.active_connections(), 0);
}

#[tokio::test]
async fn test_drop_lets_live_connections_finish() {
    let server = Server::new(ServerConfig::default(), EchoProtocol);
    let addr = server.start("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(common::wait_until(|| server.active_connections() == 1, Duration::from_secs(2)).await);
    drop(server);

    client.write_all(b"bye\n").await.unwrap();
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut reply))
        .await
        .expect("connection stalled after the server was dropped")
        .unwrap();
    assert_eq!(reply, b"bye\n");
}
