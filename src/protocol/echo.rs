//! Line echo protocol.
//!
//! Accumulates bytes until a line feed arrives (or the peer stops sending),
//! writes everything back, then closes the connection.

use super::event::{Event, Handler, LastAction, Verdict};

const LF: u8 = b'\n';

/// Reference protocol used by the `async-server` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProtocol;

impl Handler for EchoProtocol {
    type Token = ();

    fn on_event(&self, event: &Event<'_, ()>) -> Verdict<()> {
        match event.last_action() {
            LastAction::Accept => Verdict::receive().clear_buffer(),
            LastAction::Receive => {
                if event.transferred() == 0 || has_line_feed(event.received()) {
                    Verdict::send()
                } else {
                    Verdict::receive()
                }
            }
            LastAction::Send => Verdict::shutdown(),
        }
    }
}

fn has_line_feed(bytes: &[u8]) -> bool {
    bytes.contains(&LF)
}
