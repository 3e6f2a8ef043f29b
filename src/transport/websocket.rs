//! WebSocket transport
//!
//! Security is decided when the channel opens: `wss://` channels are secured
//! by their own TLS handshake, `ws://` channels stay plaintext. There is no
//! in-band upgrade.

use super::channel::{Channel, ChannelEvent, ChannelEvents, ChannelFactory, Payload, TungsteniteFactory};
use super::SieveTransport;
use crate::connection::{Connection, ConnectionState, Endpoint, TransportConfig};
use crate::listener::{ListenerSlot, TransportListener};
use crate::logger::{render_bytes, TracingLogger, TransportLogger};
use crate::metrics::{counters, histograms, labels};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// ManageSieve over a WebSocket channel
pub struct WebSocketTransport {
    connection: Connection,
    config: TransportConfig,
    factory: Arc<dyn ChannelFactory>,
    channel: Option<Box<dyn Channel>>,
    events: Option<ChannelEvents>,
    connect_started: Option<Instant>,
    listener: ListenerSlot,
    logger: Arc<dyn TransportLogger>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("connection", &self.connection)
            .field("channel", &self.channel.is_some())
            .field("listener", &self.listener)
            .finish()
    }
}

impl WebSocketTransport {
    /// Create a transport backed by `tokio-tungstenite`, logging through `tracing`
    pub fn new(config: TransportConfig) -> Self {
        Self::with_factory(config, Arc::new(TungsteniteFactory), Arc::new(TracingLogger))
    }

    /// Create a transport with a custom channel factory and logger
    pub fn with_factory(
        config: TransportConfig,
        factory: Arc<dyn ChannelFactory>,
        logger: Arc<dyn TransportLogger>,
    ) -> Self {
        Self {
            connection: Connection::new(),
            config,
            factory,
            channel: None,
            events: None,
            connect_started: None,
            listener: ListenerSlot::default(),
            logger,
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => self.on_open(),
            ChannelEvent::Message(payload) => self.on_message(payload),
            ChannelEvent::Error(message) => self.on_error(&message),
            ChannelEvent::Close => self.on_close(),
        }
    }

    fn on_open(&mut self) {
        if let Err(e) = self.connection.transition(ConnectionState::Connected) {
            tracing::warn!(error = %e, "ignoring open event");
            return;
        }

        let secure = self.connection.is_secure();
        counters::connection_opened(labels::TRANSPORT_WEBSOCKET, secure);
        if let Some(started) = self.connect_started.take() {
            histograms::connect_duration(
                labels::TRANSPORT_WEBSOCKET,
                started.elapsed().as_millis() as u64,
            );
        }

        if secure {
            // The wss:// handshake already secured the channel
            if let Err(e) = self.connection.mark_secured() {
                tracing::warn!(error = %e, "could not mark channel secured");
                return;
            }
            self.logger.log_state("channel open, secured by the wss handshake");
        } else {
            self.logger.log_state("channel open (plaintext)");
        }
    }

    fn on_message(&mut self, payload: Payload) {
        let data = payload.into_bytes();
        counters::bytes_received(labels::TRANSPORT_WEBSOCKET, data.len());

        if self.logger.is_level_stream() {
            self.logger.log_stream(&render_bytes("Server -> Client", &data));
        }
        if let Some(listener) = self.listener.get() {
            listener.on_receive(&data);
        }
    }

    fn on_error(&mut self, message: &str) {
        counters::channel_error(labels::TRANSPORT_WEBSOCKET);
        self.logger.log_state(&format!("channel error: {}", message));
        if let Some(listener) = self.listener.get() {
            listener.on_error(message);
        }
    }

    fn on_close(&mut self) {
        self.teardown(Some("channel closed"));
        // Both hooks fire for an unsolicited close
        if let Some(listener) = self.listener.get() {
            listener.on_disconnect();
        }
    }

    fn teardown(&mut self, reason: Option<&str>) {
        debug_assert_eq!(self.channel.is_some(), self.connection.state().has_channel());
        self.connection.begin_teardown(reason, self.logger.as_ref());

        let Some(mut channel) = self.channel.take() else {
            self.logger.log_state("no channel to close");
            return;
        };

        channel.close();
        self.events = None;
        self.connect_started = None;
        counters::connection_closed(labels::TRANSPORT_WEBSOCKET);

        if let Some(listener) = self.listener.get() {
            listener.on_disconnected();
        }
    }
}

#[async_trait]
impl SieveTransport for WebSocketTransport {
    async fn connect(&mut self, url: &str, secure: bool) -> Result<()> {
        let endpoint = Endpoint::parse(url)?;

        if self.channel.is_some() {
            self.logger
                .log_state("connect called with an open channel, keeping it");
            return Ok(());
        }

        self.connection.begin_connect(endpoint.clone(), secure)?;
        let address = endpoint.channel_address(secure);
        self.logger.log_state(&format!("connecting to {}", address));
        tracing::debug!(address = %address, secure, "opening websocket transport");

        let (channel, events) = match self.factory.open(&address, &self.config) {
            Ok(opened) => opened,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    "could not create channel"
                );
                let _ = self.connection.transition(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.channel = Some(channel);
        self.events = Some(events);
        self.connect_started = Some(Instant::now());
        Ok(())
    }

    async fn disconnect(&mut self, reason: Option<&str>) {
        self.teardown(reason);
    }

    async fn start_tls(&mut self) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "WebSocket security is fixed when the channel opens; connect with secure=true instead"
                .into(),
        ))
    }

    async fn on_send(&mut self, data: &[u8]) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        if self.logger.is_level_stream() {
            self.logger.log_stream(&render_bytes("Client -> Server", data));
        }
        channel.send(Bytes::copy_from_slice(data))?;
        counters::bytes_sent(labels::TRANSPORT_WEBSOCKET, data.len());
        Ok(())
    }

    async fn process_event(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };

        let event = events.recv().await;
        match event {
            Some(event) => self.handle_event(event),
            // Channel task ended without reporting a close
            None => self.on_close(),
        }
        true
    }

    fn set_listener(&mut self, listener: Weak<dyn TransportListener>) {
        self.listener.set(listener);
    }

    fn logger(&self) -> Arc<dyn TransportLogger> {
        self.logger.clone()
    }

    fn connection(&self) -> &Connection {
        &self.connection
    }
}
