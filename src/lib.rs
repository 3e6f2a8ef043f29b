//! Pluggable transports for ManageSieve clients
//!
//! A ManageSieve client drives every transport through the same
//! [`SieveTransport`] contract, no matter how the underlying channel secures
//! itself:
//!
//! * [`WebSocketTransport`] opens a `ws://` or `wss://` channel. Its security
//!   is fixed when the channel opens and cannot be renegotiated.
//! * [`StreamTransport`] opens a plaintext TCP socket and upgrades it in-band
//!   with `STARTTLS`.
//!
//! Transport-level events (inbound data, channel errors, closure) are surfaced
//! through a [`TransportListener`] held by weak reference. Lifecycle and
//! payload diagnostics go to a [`TransportLogger`].
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> sieve_transport::Result<()> {
//! use sieve_transport::{SieveTransport, TransportConfig, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::new(TransportConfig::default());
//! transport.connect("sieve://mail.example.com:4190/", true).await?;
//!
//! // Writes before the open event are queued by the channel
//! transport.on_send(b"CAPABILITY\r\n").await?;
//!
//! // Deliver channel events (open, message, error, close) to the bindings
//! while transport.process_event().await {}
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod listener;
pub mod logger;
pub mod metrics;
pub mod transport;

pub use connection::{
    Connection, ConnectionState, Endpoint, TlsConfig, TransportConfig, TransportConfigBuilder,
};
pub use error::{Error, Result};
pub use listener::TransportListener;
pub use logger::{TracingLogger, TransportLogger};
pub use transport::{
    ChannelEvent, ChannelFactory, SieveTransport, StreamConnector, StreamTransport,
    TcpConnector, TungsteniteFactory, WebSocketTransport,
};
