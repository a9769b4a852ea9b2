//! Completion dispatcher.
//!
//! Runs one connection as a sequential chain: raise an event for the
//! operation that just completed, ask the handler what to do, perform that
//! operation, repeat. The chain ends in exactly one teardown.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::net::connection::{CloseReason, CompletionError, Connection};
use crate::observability::metrics;
use crate::protocol::{Event, Handler, LastAction, NextAction, Verdict};

/// The operation that just finished, in the shape the handler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Completion {
    action: LastAction,
    received: Range<usize>,
    transferred: usize,
}

impl Completion {
    fn accepted() -> Self {
        Self {
            action: LastAction::Accept,
            received: 0..0,
            transferred: 0,
        }
    }

    fn received(range: Range<usize>) -> Self {
        metrics::record_received(range.len());
        Self {
            action: LastAction::Receive,
            transferred: range.len(),
            received: range,
        }
    }

    fn sent(bytes: usize) -> Self {
        metrics::record_sent(bytes);
        Self {
            action: LastAction::Send,
            received: 0..0,
            transferred: bytes,
        }
    }
}

/// Drive an accepted connection until it shuts down.
///
/// Never returns an error: every failure ends this connection only.
pub async fn drive<H: Handler>(handler: Arc<H>, mut conn: Connection<H::Token>) {
    let mut completion = Completion::accepted();

    let reason = loop {
        // Run the handler on a fresh scheduler turn, not inline after the I/O.
        tokio::task::yield_now().await;

        let verdict = match raise(handler.as_ref(), &conn, &completion) {
            Ok(verdict) => verdict,
            Err(payload) => {
                tracing::warn!(
                    connection_id = %conn.id(),
                    last_action = %completion.action,
                    panic = panic_message(payload.as_ref()),
                    "Handler panicked, closing connection"
                );
                break CloseReason::CallbackPanic;
            }
        };

        let (next, buffer, token) = verdict.into_parts();
        conn.apply(buffer, token);
        tracing::trace!(
            connection_id = %conn.id(),
            last_action = %completion.action,
            transferred = completion.transferred,
            next_action = %next,
            "Completion dispatched"
        );

        let result = match next {
            NextAction::Shutdown => break CloseReason::Callback,
            NextAction::Receive => conn.receive().await.map(Completion::received),
            NextAction::Send => conn.send().await.map(Completion::sent),
        };

        match result {
            Ok(done) => completion = done,
            Err(e) => {
                log_failure(&conn, next, &e);
                break e.close_reason();
            }
        }
    };

    conn.close(reason);
}

fn raise<H: Handler>(
    handler: &H,
    conn: &Connection<H::Token>,
    completion: &Completion,
) -> std::thread::Result<Verdict<H::Token>> {
    let event = Event::new(
        conn.id(),
        conn.peer_addr(),
        completion.action,
        conn.buffer().filled(),
        completion.received.clone(),
        completion.transferred,
        conn.token(),
    );
    panic::catch_unwind(AssertUnwindSafe(|| handler.on_event(&event)))
}

fn log_failure<T>(conn: &Connection<T>, next: NextAction, error: &CompletionError) {
    match error {
        CompletionError::Transport(_) => tracing::debug!(
            connection_id = %conn.id(),
            peer_addr = %conn.peer_addr(),
            operation = %next,
            error = %error,
            "Connection I/O failed"
        ),
        CompletionError::Closed | CompletionError::Buffer(_) => tracing::warn!(
            connection_id = %conn.id(),
            peer_addr = %conn.peer_addr(),
            operation = %next,
            error = %error,
            "Could not issue next operation"
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
