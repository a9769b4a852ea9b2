//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start:
//!     stop previous generation → bind + listen → spawn accept loop → return
//!
//! Stop (shutdown.rs):
//!     trigger flag → accept loop exits → drain live connections → close listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → host calls Server::stop
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - No drain deadline: a connection stays open until its handler or the
//!   peer ends it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
