//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, backlog, accept loop)
//!     → connection.rs (socket + buffer + token, live-connection tracking)
//!     → buffer.rs (receive buffer growth and reset)
//!     → Hand off to the dispatcher
//!
//! Connection States:
//!     Accepted → Receiving ⇄ Sending → Shutdown
//! ```
//!
//! # Design Decisions
//! - One outstanding operation per connection, so buffer and socket need no locks
//! - Each connection holds a tracker guard; the slot is released exactly once
//! - Plain TCP only

pub mod buffer;
pub mod connection;
pub mod listener;

pub use buffer::ReceiveBuffer;
pub use connection::{CloseReason, Connection, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
