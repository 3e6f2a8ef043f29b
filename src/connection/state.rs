//! Connection state machine

use crate::{Error, Result};

/// Connection state
///
/// WebSocket connections never enter `Upgrading`: their security is decided
/// when the channel opens. Plain connections stay at `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No channel
    #[default]
    Disconnected,

    /// Channel created, waiting for it to open
    Connecting,

    /// Channel open, no transport security
    Connected,

    /// STARTTLS sent, handshake in progress (stream transport only)
    Upgrading,

    /// Channel open and providing transport security
    Secured,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connected, Secured)
                | (Connected, Upgrading)
                | (Upgrading, Secured)
                | (_, Disconnected)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether a channel exists in this state
    pub fn has_channel(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Upgrading => write!(f, "upgrading"),
            Self::Secured => write!(f, "secured"),
        }
    }
}
