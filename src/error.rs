//! Error types for the console core.

use thiserror::Error;

/// Transport-level failures. Recovered by the reconnect loop and only ever
/// surfaced as connection status.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The host could not start a connection attempt.
    #[error("failed to open connection to {url}: {reason}")]
    Open { url: String, reason: String },

    /// Write attempted on a socket that is gone.
    #[error("socket closed")]
    SocketClosed,

    /// The host reported a send failure.
    #[error("send failed: {0}")]
    Send(String),
}

impl ChannelError {
    pub fn open(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Open {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Protocol-level failures for a single inbound frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,
}

/// Invalid outbound command construction.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("control command for '{0}' carries no values")]
    EmptyControl(String),

    #[error("crane id must not be empty")]
    EmptyCraneId,

    #[error("scenario id must not be empty")]
    EmptyScenarioId,

    #[error("simulation speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}
