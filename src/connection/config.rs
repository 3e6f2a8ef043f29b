//! Transport configuration

use super::tls::TlsConfig;
use crate::transport::constants::{
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_BUFFER_CAPACITY,
};
use std::time::Duration;

/// Transport configuration
///
/// Shared by both transports. Fields that only apply to one transport are
/// ignored by the other.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for opening the channel (default: none)
    pub connect_timeout: Option<Duration>,
    /// Timeout for STARTTLS negotiation, stream transport only (default: none)
    pub upgrade_timeout: Option<Duration>,
    /// Initial capacity of the inbound buffer, stream transport only
    pub read_buffer_capacity: usize,
    /// Largest accepted WebSocket message
    pub max_message_size: usize,
    /// Largest accepted WebSocket frame
    pub max_frame_size: usize,
    /// TLS settings for `wss://` channels and STARTTLS (default: system roots)
    pub tls: Option<TlsConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            upgrade_timeout: None,
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tls: None,
        }
    }
}

impl TransportConfig {
    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = TransportConfig::builder()
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .upgrade_timeout(Duration::from_secs(5))
    ///     .build();
    /// ```
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder {
            config: TransportConfig::default(),
        }
    }
}

/// Builder for creating `TransportConfig`
#[derive(Debug, Clone)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Set channel open timeout
    ///
    /// Default: None (no timeout)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Set STARTTLS negotiation timeout
    ///
    /// Default: None (no timeout)
    pub fn upgrade_timeout(mut self, duration: Duration) -> Self {
        self.config.upgrade_timeout = Some(duration);
        self
    }

    /// Set initial inbound buffer capacity in bytes
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.read_buffer_capacity = capacity;
        self
    }

    /// Set the largest accepted WebSocket message in bytes
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the largest accepted WebSocket frame in bytes
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set TLS configuration
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Build the configuration
    pub fn build(self) -> TransportConfig {
        self.config
    }
}
