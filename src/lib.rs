//! Callback-driven asynchronous TCP server engine.
//!
//! The engine accepts connections and moves each one through a small
//! protocol state machine supplied as a [`Handler`]: after every accept,
//! receive or send it asks the handler what to do next.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod server;

pub use config::ServerConfig;
pub use protocol::{handler_fn, EchoProtocol, Event, Handler, LastAction, NextAction, Verdict};
pub use server::{Server, ServerError};
