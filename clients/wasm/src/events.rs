//! Events queued by browser callbacks for the next `poll()`.
//!
//! WebSocket handlers and the reconnect `setTimeout` never touch the
//! console directly; they only push one of these.

use crane_console::LinkEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Something happened on the WebSocket opened as attempt `generation`.
    Link { generation: u64, event: LinkEvent },
    /// The reconnect timer fired.
    ReconnectDue,
}

impl ClientEvent {
    pub fn link(generation: u64, event: LinkEvent) -> Self {
        ClientEvent::Link { generation, event }
    }

    /// Whether this event should be dropped given the current attempt.
    pub fn is_stale(&self, current_generation: u64) -> bool {
        match self {
            ClientEvent::Link { generation, .. } => *generation != current_generation,
            ClientEvent::ReconnectDue => false,
        }
    }
}
