//! Connection resource and lifecycle tracking.
//!
//! # Responsibilities
//! - Own one accepted socket, its receive buffer and its handler token
//! - Perform exactly one receive or send at a time
//! - Tear down exactly once (shutdown both directions, close, release slot)
//! - Count live connections so shutdown can wait for them to drain

use std::fmt;
use std::net::{Shutdown, SocketAddr};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::net::buffer::{BufferError, ReceiveBuffer};
use crate::observability::metrics;
use crate::protocol::{BufferUpdate, TokenUpdate};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no operation issued yet.
    Accepted,
    /// A receive is in flight or just completed.
    Receiving,
    /// A send is in flight or just completed.
    Sending,
    /// Torn down. Terminal.
    Shutdown,
}

/// Why a connection was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The handler asked for it.
    Callback,
    /// A receive or send failed at the transport layer.
    IoError,
    /// The receive buffer hit its size limit.
    BufferLimit,
    /// The handler panicked.
    CallbackPanic,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Callback => "callback",
            CloseReason::IoError => "io_error",
            CloseReason::BufferLimit => "buffer_limit",
            CloseReason::CallbackPanic => "callback_panic",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a receive or send, including failures to issue one.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("connection is already closed")]
    Closed,
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),
}

impl CompletionError {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            CompletionError::Closed | CompletionError::Transport(_) => CloseReason::IoError,
            CompletionError::Buffer(_) => CloseReason::BufferLimit,
        }
    }
}

/// Tracks live connections for graceful shutdown.
///
/// Cloned into the accept loop; every clone shares one counter.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live connection. Returns a guard that releases the slot
    /// exactly once, explicitly or on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::record_slot_acquired();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
            released: false,
        }
    }

    /// Get current live connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has been released.
    pub async fn wait_for_drain(&self, poll_interval: Duration) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
    released: bool,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Release the slot now. Returns the number of connections still live.
    pub fn release(mut self) -> u64 {
        self.released = true;
        metrics::record_slot_released();
        self.active_count.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if !self.released {
            self.active_count.fetch_sub(1, Ordering::SeqCst);
            metrics::record_slot_released();
            tracing::trace!(connection_id = %self.id, "Connection slot released on drop");
        }
    }
}

/// One accepted connection.
///
/// Generic over the handler's token type.
#[derive(Debug)]
pub struct Connection<T> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: Option<TcpStream>,
    buffer: ReceiveBuffer,
    token: Option<T>,
    state: ConnectionState,
    guard: Option<ConnectionGuard>,
}

impl<T> Connection<T> {
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        buffer: ReceiveBuffer,
        guard: ConnectionGuard,
    ) -> Self {
        Self {
            id: guard.id(),
            peer_addr,
            stream: Some(stream),
            buffer,
            token: None,
            state: ConnectionState::Accepted,
            guard: Some(guard),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }

    pub fn token(&self) -> Option<&T> {
        self.token.as_ref()
    }

    /// Apply the buffer and token parts of a handler verdict.
    pub fn apply(&mut self, buffer: BufferUpdate, token: TokenUpdate<T>) {
        match buffer {
            BufferUpdate::Keep => {}
            BufferUpdate::Clear => self.buffer.clear(),
            BufferUpdate::Replace(bytes) => self.buffer.replace(bytes),
        }
        match token {
            TokenUpdate::Keep => {}
            TokenUpdate::Clear => self.token = None,
            TokenUpdate::Set(token) => self.token = Some(token),
        }
    }

    /// Read once into the buffer's free region.
    ///
    /// Returns the range of the buffer that was filled; empty when the peer
    /// has closed its write half.
    pub async fn receive(&mut self) -> Result<Range<usize>, CompletionError> {
        let stream = self.stream.as_mut().ok_or(CompletionError::Closed)?;
        let region = self.buffer.grow()?;
        self.state = ConnectionState::Receiving;

        let n = stream
            .read(self.buffer.region_mut(region))
            .await
            .map_err(CompletionError::Transport)?;
        Ok(self.buffer.commit(n))
    }

    /// Write the whole buffer, then clear it. Returns the bytes written.
    pub async fn send(&mut self) -> Result<usize, CompletionError> {
        let stream = self.stream.as_mut().ok_or(CompletionError::Closed)?;
        self.state = ConnectionState::Sending;

        let bytes = self.buffer.filled();
        stream
            .write_all(bytes)
            .await
            .map_err(CompletionError::Transport)?;
        let sent = bytes.len();
        self.buffer.clear();
        Ok(sent)
    }

    /// Tear the connection down.
    ///
    /// Shuts down both directions and closes the socket, ignoring errors,
    /// then releases the live-connection slot. Returns `false` if the
    /// connection was already closed.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        let Some(stream) = self.stream.take() else {
            return false;
        };

        match stream.into_std() {
            Ok(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            Err(e) => {
                tracing::trace!(connection_id = %self.id, error = %e, "Socket deregistration failed");
            }
        }

        self.state = ConnectionState::Shutdown;
        self.buffer.clear();

        let active = self.guard.take().map(ConnectionGuard::release).unwrap_or_default();
        metrics::record_closed(reason.as_str());
        tracing::debug!(
            connection_id = %self.id,
            peer_addr = %self.peer_addr,
            reason = %reason,
            active_connections = active,
            "Connection closed"
        );
        true
    }
}
