//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_server::net::ConnectionId;
use async_server::{Event, Handler, LastAction, Server, ServerConfig, Verdict};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Start a server on an ephemeral loopback port.
pub async fn start_server<H: Handler>(handler: H) -> (Server<H>, SocketAddr) {
    start_server_with(ServerConfig::default(), handler).await
}

#[allow(dead_code)]
/// Start a server with a custom config on an ephemeral loopback port.
pub async fn start_server_with<H: Handler>(config: ServerConfig, handler: H) -> (Server<H>, SocketAddr) {
    let server = Server::new(config, handler);
    let addr = server
        .start("127.0.0.1:0".parse().unwrap())
        .await
        .expect("server failed to start");
    (server, addr)
}

/// Write each chunk separately, pausing between them, half-close, then read
/// to EOF.
pub async fn exchange(addr: SocketAddr, chunks: &[&[u8]]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        stream.write_all(chunk).await.unwrap();
    }
    stream.shutdown().await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .expect("server did not close the connection")
        .unwrap();
    reply
}

/// Poll `condition` until it holds or `timeout` expires.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Echo protocol that also records every event it sees.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingEcho {
    pub events: Mutex<Vec<(ConnectionId, LastAction, usize)>>,
}

#[allow(dead_code)]
impl RecordingEcho {
    pub fn events(&self) -> Vec<(ConnectionId, LastAction, usize)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, action: LastAction) -> usize {
        self.events().iter().filter(|(_, a, _)| *a == action).count()
    }
}

impl Handler for RecordingEcho {
    type Token = ();

    fn on_event(&self, event: &Event<'_, ()>) -> Verdict<()> {
        self.events
            .lock()
            .unwrap()
            .push((event.connection_id(), event.last_action(), event.transferred()));
        async_server::EchoProtocol.on_event(event)
    }
}
