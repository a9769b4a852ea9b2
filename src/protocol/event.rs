//! Event contract between the engine and the protocol handler.

use std::fmt;
use std::net::SocketAddr;
use std::ops::Range;

use crate::net::connection::ConnectionId;

/// The low-level operation that just completed on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LastAction {
    Accept,
    Receive,
    Send,
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastAction::Accept => write!(f, "accept"),
            LastAction::Receive => write!(f, "receive"),
            LastAction::Send => write!(f, "send"),
        }
    }
}

/// What the handler wants the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextAction {
    /// Read more bytes, appending them to the buffer.
    Receive,
    /// Write the whole buffer to the peer.
    Send,
    /// Close the connection.
    Shutdown,
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAction::Receive => write!(f, "receive"),
            NextAction::Send => write!(f, "send"),
            NextAction::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A completed operation, as seen by the handler.
///
/// Borrowed from the connection for the duration of one handler call.
#[derive(Debug)]
pub struct Event<'a, T> {
    connection_id: ConnectionId,
    peer_addr: SocketAddr,
    last_action: LastAction,
    buffer: &'a [u8],
    received: Range<usize>,
    transferred: usize,
    token: Option<&'a T>,
}

impl<'a, T> Event<'a, T> {
    pub(crate) fn new(
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
        last_action: LastAction,
        buffer: &'a [u8],
        received: Range<usize>,
        transferred: usize,
        token: Option<&'a T>,
    ) -> Self {
        Self {
            connection_id,
            peer_addr,
            last_action,
            buffer,
            received,
            transferred,
            token,
        }
    }

    pub fn last_action(&self) -> LastAction {
        self.last_action
    }

    /// All bytes accumulated since the buffer was last cleared.
    ///
    /// Empty on `Accept` and on `Send` (the buffer is cleared once its
    /// contents have been written).
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Only the bytes filled by the receive that just completed.
    pub fn received(&self) -> &'a [u8] {
        &self.buffer[self.received.clone()]
    }

    /// Bytes moved by the last operation. Zero for `Accept`; zero on
    /// `Receive` when the peer closed its write half.
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// The per-connection token from the most recent verdict that set one.
    pub fn token(&self) -> Option<&'a T> {
        self.token
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// How a verdict changes the connection's buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BufferUpdate {
    #[default]
    Keep,
    Clear,
    Replace(Vec<u8>),
}

/// How a verdict changes the connection's token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

/// The handler's answer to an [`Event`].
///
/// ```
/// use async_server::Verdict;
///
/// let verdict: Verdict<u32> = Verdict::receive().clear_buffer().with_token(1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Verdict<T> {
    next: NextAction,
    buffer: BufferUpdate,
    token: TokenUpdate<T>,
}

impl<T> Verdict<T> {
    pub fn new(next: NextAction) -> Self {
        Self {
            next,
            buffer: BufferUpdate::Keep,
            token: TokenUpdate::Keep,
        }
    }

    pub fn receive() -> Self {
        Self::new(NextAction::Receive)
    }

    pub fn send() -> Self {
        Self::new(NextAction::Send)
    }

    pub fn shutdown() -> Self {
        Self::new(NextAction::Shutdown)
    }

    /// Discard whatever is buffered before the next operation.
    pub fn clear_buffer(mut self) -> Self {
        self.buffer = BufferUpdate::Clear;
        self
    }

    /// Replace the buffer, typically with a response to send.
    pub fn replace_buffer(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.buffer = BufferUpdate::Replace(bytes.into());
        self
    }

    pub fn with_token(mut self, token: T) -> Self {
        self.token = TokenUpdate::Set(token);
        self
    }

    pub fn clear_token(mut self) -> Self {
        self.token = TokenUpdate::Clear;
        self
    }

    pub fn next_action(&self) -> NextAction {
        self.next
    }

    pub fn buffer_update(&self) -> &BufferUpdate {
        &self.buffer
    }

    pub fn token_update(&self) -> &TokenUpdate<T> {
        &self.token
    }

    pub(crate) fn into_parts(self) -> (NextAction, BufferUpdate, TokenUpdate<T>) {
        (self.next, self.buffer, self.token)
    }
}

/// A protocol state machine driven by the engine.
///
/// Called once per completed operation on each connection, never
/// concurrently for the same connection. Implementations decide only what
/// happens next; the engine owns the socket and the buffer.
pub trait Handler: Send + Sync + 'static {
    /// Opaque per-connection state threaded through every event.
    type Token: Send + 'static;

    fn on_event(&self, event: &Event<'_, Self::Token>) -> Verdict<Self::Token>;
}

/// Handler built from a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Wrap a stateless closure as a [`Handler`] with no token.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&Event<'a, ()>) -> Verdict<()> + Send + Sync + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&Event<'a, ()>) -> Verdict<()> + Send + Sync + 'static,
{
    type Token = ();

    fn on_event(&self, event: &Event<'_, ()>) -> Verdict<()> {
        (self.f)(event)
    }
}
