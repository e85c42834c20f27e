//! Transport Channel: the connection state machine.
//!
//! The channel does no IO of its own. The host supplies three capabilities
//! and feeds link events back in:
//!
//! ```text
//!            connect()                 handle_open()
//! Disconnected ───────▶ Connecting ─────────────────▶ Open
//!      ▲                    │                           │
//!      │  reconnect_due()   │ handle_close/handle_error │
//!      └────── timer ◀──────┴───────────────────────────┘
//! ```
//!
//! | Capability         | Host implementation (native / browser)        |
//! |--------------------|-----------------------------------------------|
//! | [`Connector`]      | tokio-tungstenite task / `web_sys::WebSocket` |
//! | [`Socket`]         | outbound mpsc sender / `WebSocket::send_*`    |
//! | [`ReconnectTimer`] | tokio deadline / `setTimeout`                 |
//!
//! At most one reconnect is pending at any time. Retries never stop on
//! their own; only [`Channel::disconnect`] suppresses them.

use std::time::Duration;

use crate::error::ChannelError;
use crate::protocol::{classify_frame, Command, ConnectionStatus, InboundFrame, Snapshot};
use crate::types::ReconnectPolicy;

// ---------------------------------------------------------------------------
// Host capabilities
// ---------------------------------------------------------------------------

/// An established (or establishing) link to the server.
pub trait Socket {
    fn send_text(&mut self, text: &str) -> Result<(), ChannelError>;
    fn close(&mut self);
}

/// Starts connection attempts. Success or failure of the attempt is
/// reported later through the channel's `handle_*` methods.
pub trait Connector {
    type Socket: Socket;

    fn open(&mut self, url: &str) -> Result<Self::Socket, ChannelError>;
}

/// One-shot timer. When it fires the host calls [`Channel::reconnect_due`].
pub trait ReconnectTimer {
    fn schedule(&mut self, delay: Duration);
    fn cancel(&mut self);
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

pub struct Channel<C: Connector, T: ReconnectTimer> {
    url: String,
    policy: ReconnectPolicy,
    connector: C,
    timer: T,
    socket: Option<C::Socket>,
    state: ConnectionState,
    reconnect_pending: bool,
    /// Consecutive failed attempts since the last open.
    attempts: u32,
    /// Set by `disconnect`; cleared by the next `connect`.
    suppressed: bool,
}

impl<C: Connector, T: ReconnectTimer> Channel<C, T> {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy, connector: C, timer: T) -> Self {
        Self {
            url: url.into(),
            policy,
            connector,
            timer,
            socket: None,
            state: ConnectionState::Disconnected,
            reconnect_pending: false,
            attempts: 0,
            suppressed: false,
        }
    }

    /// Start a connection attempt. No-op unless `Disconnected`.
    ///
    /// Returns the status to report, if it changed.
    pub fn connect(&mut self) -> Option<ConnectionStatus> {
        self.suppressed = false;
        if self.state != ConnectionState::Disconnected {
            return None;
        }
        log::info!("[channel] Connecting to {}", self.url);
        self.state = ConnectionState::Connecting;
        match self.connector.open(&self.url) {
            Ok(socket) => {
                self.socket = Some(socket);
                None
            }
            Err(e) => {
                log::warn!("[channel] {e}");
                self.lost()
            }
        }
    }

    pub fn handle_open(&mut self) -> Option<ConnectionStatus> {
        if self.state != ConnectionState::Connecting {
            log::debug!("[channel] Open event in state {:?} ignored", self.state);
            return None;
        }
        self.timer.cancel();
        self.reconnect_pending = false;
        self.attempts = 0;
        self.state = ConnectionState::Open;
        log::info!("[channel] Connected to {}", self.url);
        Some(ConnectionStatus::Connected)
    }

    pub fn handle_close(&mut self, reason: &str) -> Option<ConnectionStatus> {
        log::info!("[channel] Closed ({})", non_empty(reason));
        self.lost()
    }

    pub fn handle_error(&mut self, message: &str) -> Option<ConnectionStatus> {
        log::warn!("[channel] Transport error: {}", non_empty(message));
        self.lost()
    }

    /// The reconnect timer fired.
    pub fn reconnect_due(&mut self) -> Option<ConnectionStatus> {
        if !self.reconnect_pending {
            log::debug!("[channel] Stray reconnect timer ignored");
            return None;
        }
        self.reconnect_pending = false;
        self.timer.cancel();
        self.connect()
    }

    /// Classify one inbound text frame. Connection state is never touched.
    pub fn handle_frame(&self, text: &str) -> Option<Snapshot> {
        match classify_frame(text) {
            Ok(InboundFrame::Snapshot(snapshot)) => Some(*snapshot),
            Ok(InboundFrame::ServerError(message)) => {
                log::warn!("[channel] Server error: {message}");
                None
            }
            Ok(InboundFrame::Ack(ack)) => {
                log::trace!("[channel] Ack {:?}", ack.kind);
                None
            }
            Err(e) => {
                log::error!("[channel] Dropping malformed frame: {e}");
                None
            }
        }
    }

    /// Write one command. Returns `false` when not open or on failure.
    pub fn send(&mut self, command: &Command) -> bool {
        let socket = match (&self.state, self.socket.as_mut()) {
            (ConnectionState::Open, Some(socket)) => socket,
            _ => {
                log::warn!(
                    "[channel] Not connected ({:?}); {} command dropped",
                    self.state,
                    command.kind()
                );
                return false;
            }
        };
        let text = match command.to_json() {
            Ok(text) => text,
            Err(e) => {
                log::error!("[channel] Could not encode {} command: {e}", command.kind());
                return false;
            }
        };
        match socket.send_text(&text) {
            Ok(()) => {
                log::debug!("[channel] Sent {}", command.kind());
                true
            }
            Err(e) => {
                log::warn!("[channel] {} command not sent: {e}", command.kind());
                false
            }
        }
    }

    /// Operator shutdown. No reconnect happens until the next `connect`.
    pub fn disconnect(&mut self) -> Option<ConnectionStatus> {
        self.suppressed = true;
        self.timer.cancel();
        self.reconnect_pending = false;
        if let Some(mut socket) = self.socket.take() {
            socket.close();
        }
        let was = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        if was == ConnectionState::Disconnected {
            return None;
        }
        log::info!("[channel] Disconnected by operator");
        Some(ConnectionStatus::Disconnected)
    }

    fn lost(&mut self) -> Option<ConnectionStatus> {
        self.socket = None;
        let was = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        self.schedule_reconnect();
        (was != ConnectionState::Disconnected).then_some(ConnectionStatus::Disconnected)
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_pending || self.suppressed {
            return;
        }
        let delay = self.policy.delay_for(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.reconnect_pending = true;
        self.timer.schedule(delay);
        log::info!(
            "[channel] Reconnecting in {} ms (attempt {})",
            delay.as_millis(),
            self.attempts
        );
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::Open => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() {
        "no reason"
    } else {
        s
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
