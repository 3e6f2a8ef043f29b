//! Transport contract and implementations
//!
//! Two security models sit behind one contract:
//! * [`WebSocketTransport`]: security fixed when the channel opens
//! * [`StreamTransport`]: plaintext TCP, upgraded in-band with `STARTTLS`

mod channel;
pub mod constants;
mod connector;
mod stream;
mod websocket;

pub use channel::{Channel, ChannelEvent, ChannelEvents, ChannelFactory, Payload, TungsteniteFactory};
pub use connector::{AsyncReadWrite, BoxedStream, StreamConnector, TcpConnector};
pub use stream::{StreamChannel, StreamTransport};
pub use websocket::WebSocketTransport;

use crate::connection::Connection;
use crate::listener::TransportListener;
use crate::logger::TransportLogger;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Weak};

/// Operations every ManageSieve transport exposes.
///
/// The owning client drives a transport identically whatever its security
/// model. Channel events are delivered one at a time by
/// [`process_event`](SieveTransport::process_event); `&mut self` on every
/// operation keeps events and caller operations from interleaving.
#[async_trait]
pub trait SieveTransport: Send {
    /// Parse `url` (`sieve://host:port[/path]`) and open the channel.
    ///
    /// A second call while a channel exists is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`](crate::Error::InvalidUrl) before any channel is
    /// created if `url` is malformed.
    async fn connect(&mut self, url: &str, secure: bool) -> Result<()>;

    /// Tear the connection down.
    ///
    /// Never fails. Without a channel this only runs the bookkeeping; with
    /// one it closes the channel and notifies
    /// [`on_disconnected`](TransportListener::on_disconnected).
    async fn disconnect(&mut self, reason: Option<&str>);

    /// Upgrade the channel to TLS in-band.
    async fn start_tls(&mut self) -> Result<()>;

    /// Whether the caller requested a secure channel
    fn is_secure(&self) -> bool {
        self.connection().is_secure()
    }

    /// Whether the channel is confirmed to provide transport security
    fn is_secured(&self) -> bool {
        self.connection().is_secured()
    }

    /// Transmit `data` over the channel.
    async fn on_send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait for the next channel event and run its binding.
    ///
    /// Returns `false` once there is no channel to wait on.
    async fn process_event(&mut self) -> bool;

    /// Attach the listener notified of transport-level events
    fn set_listener(&mut self, listener: Weak<dyn TransportListener>);

    /// The externally supplied logger
    fn logger(&self) -> Arc<dyn TransportLogger>;

    /// The connection record
    fn connection(&self) -> &Connection;
}
