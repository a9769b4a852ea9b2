//! Server engine: start, stop and drain.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::net::buffer::ReceiveBuffer;
use crate::net::connection::{Connection, ConnectionTracker};
use crate::net::listener::{run_accept_loop, Listener, ListenerError};
use crate::observability::metrics;
use crate::protocol::Handler;
use crate::server::dispatcher;
use crate::server::ServerError;

/// A running listener and its accept loop.
struct Generation {
    shutdown: Shutdown,
    accept_loop: JoinHandle<Listener>,
    local_addr: SocketAddr,
}

/// Asynchronous TCP server driven by a [`Handler`].
///
/// The live-connection count belongs to the instance, so any number of
/// servers can run side by side in one process.
///
/// `start` and `stop` are serialized on the generation lock, which is held
/// through the drain. Introspection never takes that lock.
pub struct Server<H: Handler> {
    config: ServerConfig,
    handler: Arc<H>,
    tracker: ConnectionTracker,
    generation: Mutex<Option<Generation>>,
    // Bound address while accepting; cleared as soon as a stop begins.
    listening: watch::Sender<Option<SocketAddr>>,
}

impl<H: Handler> Server<H> {
    /// Create a server. Nothing is bound until [`start`](Self::start).
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            tracker: ConnectionTracker::new(),
            generation: Mutex::new(None),
            listening: watch::channel(None).0,
        }
    }

    /// Bind `endpoint`, start listening and launch the accept loop.
    ///
    /// Stops (and fully drains) any previous generation first. Returns once
    /// the listener is up, with the address actually bound.
    pub async fn start(&self, endpoint: SocketAddr) -> Result<SocketAddr, ServerError> {
        let mut generation = self.generation.lock().await;
        self.shut_down(generation.take()).await;

        let listener = Listener::bind(endpoint, self.config.listener.backlog)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let shutdown = Shutdown::new();

        let handler = Arc::clone(&self.handler);
        let tracker = self.tracker.clone();
        let buffer = self.config.buffer.clone();
        let accept_loop = tokio::spawn(run_accept_loop(
            listener,
            shutdown.subscribe(),
            move |stream, peer_addr| {
                let guard = tracker.track();
                let active = tracker.active_count();
                metrics::record_accepted();
                tracing::debug!(
                    connection_id = %guard.id(),
                    peer_addr = %peer_addr,
                    active_connections = active,
                    "Connection accepted"
                );

                let conn = Connection::new(
                    stream,
                    peer_addr,
                    ReceiveBuffer::new(buffer.initial_size, buffer.max_size),
                    guard,
                );
                tokio::spawn(dispatcher::drive(Arc::clone(&handler), conn));
            },
        ));

        *generation = Some(Generation {
            shutdown,
            accept_loop,
            local_addr,
        });
        self.listening.send_replace(Some(local_addr));
        tracing::info!(address = %local_addr, "Server started");
        Ok(local_addr)
    }

    /// Start on the configured `listener.bind_address`.
    pub async fn start_configured(&self) -> Result<SocketAddr, ServerError> {
        let address = &self.config.listener.bind_address;
        let endpoint = address
            .parse::<SocketAddr>()
            .map_err(|source| ServerError::InvalidAddress {
                address: address.clone(),
                source,
            })?;
        self.start(endpoint).await
    }

    /// Stop accepting, wait for every live connection to finish, then close
    /// the listener. A no-op when the server is not running.
    pub async fn stop(&self) {
        let mut generation = self.generation.lock().await;
        self.shut_down(generation.take()).await;
    }

    async fn shut_down(&self, generation: Option<Generation>) {
        let Some(Generation {
            shutdown,
            accept_loop,
            local_addr,
        }) = generation
        else {
            return;
        };

        tracing::info!(
            address = %local_addr,
            active_connections = self.tracker.active_count(),
            "Stopping server"
        );
        self.listening.send_replace(None);
        shutdown.trigger();

        let listener = match accept_loop.await {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::error!(error = %e, "Accept loop terminated abnormally");
                None
            }
        };

        self.tracker
            .wait_for_drain(self.config.shutdown.drain_poll_interval())
            .await;
        drop(listener);
        tracing::info!(address = %local_addr, "Server stopped");
    }

    /// Connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Address of the listener while it is accepting. `None` once a stop
    /// has begun, even if connections are still draining.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.listening.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.listening.borrow().is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: Handler> Drop for Server<H> {
    fn drop(&mut self) {
        // Stop accepting; live connections finish on their own.
        if let Some(generation) = self.generation.get_mut() {
            generation.shutdown.trigger();
        }
    }
}
