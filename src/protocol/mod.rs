//! Protocol contract subsystem.
//!
//! # Data Flow
//! ```text
//! Completed operation (accept / receive / send)
//!     → event.rs (Event: buffer view, transferred count, last action, token)
//!     → Handler::on_event
//!     → Verdict (next action, buffer update, token update)
//!     → back to the dispatcher
//! ```
//!
//! # Design Decisions
//! - Handlers return a value instead of mutating a shared event object
//! - The engine never looks at payload bytes; framing is the handler's job
//! - The token type is chosen by the handler, so per-connection state is
//!   typed instead of an opaque box

pub mod echo;
pub mod event;

pub use echo::EchoProtocol;
pub use event::{
    handler_fn, BufferUpdate, Event, Handler, HandlerFn, LastAction, NextAction, TokenUpdate,
    Verdict,
};
