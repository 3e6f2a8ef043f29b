//! Connection record shared by all transports

use super::endpoint::Endpoint;
use super::state::ConnectionState;
use crate::logger::TransportLogger;
use crate::{Error, Result};

/// Transport-agnostic connection record
///
/// Tracks the endpoint, the caller's security intent and whether the channel
/// actually provides security. The channel handle itself is owned by the
/// concrete transport.
#[derive(Debug, Default)]
pub struct Connection {
    endpoint: Option<Endpoint>,
    requested_security: bool,
    security_established: bool,
    state: ConnectionState,
}

impl Connection {
    /// Create an empty connection (no endpoint, no channel)
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint of the current or last connect attempt
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the caller asked for a secure channel
    pub fn is_secure(&self) -> bool {
        self.requested_security
    }

    /// Whether the channel is confirmed to provide transport security
    pub fn is_secured(&self) -> bool {
        self.security_established
    }

    /// Record a new connect attempt and enter `Connecting`
    pub(crate) fn begin_connect(&mut self, endpoint: Endpoint, secure: bool) -> Result<()> {
        self.state.transition(ConnectionState::Connecting)?;
        self.endpoint = Some(endpoint);
        self.requested_security = secure;
        self.security_established = false;
        Ok(())
    }

    pub(crate) fn transition(&mut self, next: ConnectionState) -> Result<()> {
        self.state.transition(next)
    }

    /// Mark the channel as secured.
    ///
    /// Security can only be established on a connection that requested it.
    pub(crate) fn mark_secured(&mut self) -> Result<()> {
        if !self.requested_security {
            return Err(Error::InvalidState {
                expected: "security requested at connect".into(),
                actual: "plaintext connection".into(),
            });
        }
        self.state.transition(ConnectionState::Secured)?;
        self.security_established = true;
        Ok(())
    }

    /// Teardown bookkeeping every transport runs before releasing its channel.
    ///
    /// Safe to call in any state, including repeatedly.
    pub(crate) fn begin_teardown(&mut self, reason: Option<&str>, logger: &dyn TransportLogger) {
        match reason {
            Some(reason) => logger.log_state(&format!(
                "disconnecting from {} ({}): {}",
                self.describe_endpoint(),
                self.state,
                reason
            )),
            None => logger.log_state(&format!(
                "disconnecting from {} ({})",
                self.describe_endpoint(),
                self.state
            )),
        }

        // Always valid: any state may move to Disconnected
        let _ = self.state.transition(ConnectionState::Disconnected);
        self.security_established = false;
    }

    fn describe_endpoint(&self) -> String {
        self.endpoint
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<none>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::TracingLogger;

    fn endpoint() -> Endpoint {
        Endpoint::parse("sieve://mail.example.com:4190/").unwrap()
    }

    #[test]
    fn test_new_connection_is_empty() {
        let conn = Connection::new();
        assert!(conn.endpoint().is_none());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_secure());
        assert!(!conn.is_secured());
    }

    #[test]
    fn test_begin_connect_records_intent() {
        let mut conn = Connection::new();
        conn.begin_connect(endpoint(), true).unwrap();

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(conn.is_secure());
        assert!(!conn.is_secured());
        assert_eq!(conn.endpoint().unwrap().port(), 4190);
    }

    #[test]
    fn test_begin_connect_twice_fails() {
        let mut conn = Connection::new();
        conn.begin_connect(endpoint(), false).unwrap();
        assert!(conn.begin_connect(endpoint(), true).is_err());
        assert!(!conn.is_secure());
    }

    #[test]
    fn test_mark_secured_requires_request() {
        let mut conn = Connection::new();
        conn.begin_connect(endpoint(), false).unwrap();
        conn.transition(ConnectionState::Connected).unwrap();

        assert!(conn.mark_secured().is_err());
        assert!(!conn.is_secured());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_mark_secured() {
        let mut conn = Connection::new();
        conn.begin_connect(endpoint(), true).unwrap();
        conn.transition(ConnectionState::Connected).unwrap();
        conn.mark_secured().unwrap();

        assert!(conn.is_secured());
        assert_eq!(conn.state(), ConnectionState::Secured);
    }

    #[test]
    fn test_teardown_clears_security_but_keeps_intent() {
        let mut conn = Connection::new();
        conn.begin_connect(endpoint(), true).unwrap();
        conn.transition(ConnectionState::Connected).unwrap();
        conn.mark_secured().unwrap();

        conn.begin_teardown(Some("test"), &TracingLogger);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_secured());
        assert!(conn.is_secure());

        // Idempotent
        conn.begin_teardown(None, &TracingLogger);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reusable_after_teardown() {
        let mut conn = Connection::new();
        conn.begin_connect(endpoint(), true).unwrap();
        conn.begin_teardown(None, &TracingLogger);

        conn.begin_connect(endpoint(), false).unwrap();
        assert!(!conn.is_secure());
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }
}
