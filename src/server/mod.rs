//! Server engine subsystem.
//!
//! # Data Flow
//! ```text
//! Server::start(endpoint)
//!     → stop previous generation (drain)
//!     → net::listener (bind, listen, accept loop task)
//!     → per accepted socket: tracker slot + Connection
//!     → dispatcher.rs (Accept event → handler → receive/send → event → …)
//!     → teardown releases the slot
//!
//! Server::stop()
//!     → shutdown flag → accept loop returns the listener
//!     → wait until no connection is live → close listener
//! ```
//!
//! # Design Decisions
//! - Only start errors reach the caller; per-connection failures end that
//!   connection and are logged
//! - A panicking handler closes its connection instead of killing the task
//!   silently
//! - Stop has no deadline; handlers decide how long a connection lives

use std::net::AddrParseError;

pub mod dispatcher;
pub mod engine;

pub use engine::Server;

use crate::net::listener::ListenerError;

/// Errors surfaced by [`Server`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("invalid bind address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },
}
