//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the requested endpoint with an explicit backlog
//! - Accept incoming TCP connections until shutdown is requested
//! - Graceful handling of accept errors

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::lifecycle::ShutdownSignal;

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to create or bind the socket.
    #[error("failed to bind: {0}")]
    Bind(#[source] io::Error),
    /// Failed to start listening.
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),
}

/// A bound, listening TCP socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    backlog: u32,
}

impl Listener {
    /// Bind to `addr` and start listening with the given backlog.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(addr: SocketAddr, backlog: u32) -> Result<Self, ListenerError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Bind)?;

        #[cfg(unix)]
        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;

        socket.bind(addr).map_err(ListenerError::Bind)?;
        let inner = socket.listen(backlog).map_err(ListenerError::Listen)?;

        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %local_addr, backlog, "Listener bound");

        Ok(Self { inner, backlog })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept().await
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }
}

/// Accept connections until `shutdown` fires, passing each one to
/// `on_accept`. Returns the listener so the caller decides when it closes.
///
/// The flag is checked before every accept, and a pending accept is
/// abandoned as soon as shutdown is requested.
pub async fn run_accept_loop<F>(listener: Listener, mut shutdown: ShutdownSignal, mut on_accept: F) -> Listener
where
    F: FnMut(TcpStream, SocketAddr),
{
    loop {
        if shutdown.is_triggered() {
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => on_accept(stream, peer_addr),
                Err(e) => {
                    tracing::debug!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }

    tracing::debug!("Accept loop stopped");
    listener
}
