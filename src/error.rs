//! Error types

use std::io;
use thiserror::Error;

/// Transport error
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed connection URL; raised before any channel is created
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Operation the transport cannot perform (e.g. STARTTLS on a WebSocket)
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Condition reported by the underlying channel
    #[error("channel error: {0}")]
    Channel(String),

    /// In-band security upgrade failed; the connection has been torn down
    #[error("security upgrade failed: {0}")]
    UpgradeFailure(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid connection state for the requested operation
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// No channel is open
    #[error("not connected")]
    NotConnected,

    /// Channel closed while an operation was in flight
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosed,
            WsError::Io(e) => Error::Io(e),
            other => Error::Channel(other.to_string()),
        }
    }
}

impl Error {
    /// Create an upgrade failure from any displayable cause
    pub(crate) fn upgrade(cause: impl std::fmt::Display) -> Self {
        Error::UpgradeFailure(cause.to_string())
    }

    /// Whether a fresh connect attempt may succeed after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Channel(_) | Error::ConnectionClosed | Error::UpgradeFailure(_)
        )
    }

    /// Stable label used for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::UnsupportedOperation(_) => "unsupported_operation",
            Error::Channel(_) => "channel",
            Error::UpgradeFailure(_) => "upgrade_failure",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::InvalidState { .. } => "invalid_state",
            Error::NotConnected => "not_connected",
            Error::ConnectionClosed => "connection_closed",
        }
    }
}
