//! Byte stream transport with in-band STARTTLS upgrade

use super::connector::{BoxedStream, StreamConnector, TcpConnector};
use super::constants::{status, CRLF, MAX_RESPONSE_LINE, STARTTLS_COMMAND};
use super::SieveTransport;
use crate::connection::{
    parse_server_name, Connection, ConnectionState, Endpoint, TlsConfig, TransportConfig,
};
use crate::listener::{ListenerSlot, TransportListener};
use crate::logger::{render_bytes, TracingLogger, TransportLogger};
use crate::metrics::{counters, histograms, labels};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use sha2::Digest;
use std::io;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::Instrument;

/// Socket wrapped by the stream transport: plaintext, or TLS after STARTTLS
#[allow(clippy::large_enum_variant)]
pub enum StreamChannel {
    /// Plaintext stream
    Plain(BoxedStream),
    /// TLS session over the same stream
    Tls(Box<tokio_rustls::client::TlsStream<BoxedStream>>),
}

impl std::fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamChannel::Plain(_) => f.write_str("StreamChannel::Plain(Stream)"),
            StreamChannel::Tls(_) => f.write_str("StreamChannel::Tls(TlsStream)"),
        }
    }
}

impl StreamChannel {
    /// Write a complete command and push it onto the wire
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            StreamChannel::Plain(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
            StreamChannel::Tls(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
        }
        Ok(())
    }

    /// Append whatever the server sent next to `buf`; `Ok(0)` means EOF
    pub async fn receive(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            StreamChannel::Plain(stream) => stream.read_buf(buf).await?,
            StreamChannel::Tls(stream) => stream.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Close our side. A TLS session sends `close_notify` first.
    pub async fn close(&mut self) -> Result<()> {
        match self {
            StreamChannel::Plain(stream) => stream.shutdown().await?,
            StreamChannel::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }

    /// Whether STARTTLS already wrapped this socket
    pub fn is_tls(&self) -> bool {
        matches!(self, StreamChannel::Tls(_))
    }

    /// Run the client TLS handshake on the socket the server just agreed to
    /// secure, verifying its certificate against `hostname`.
    ///
    /// The plaintext socket is consumed either way; on failure the caller has
    /// nothing left to tear down but its own bookkeeping.
    pub async fn start_tls(self, tls_config: &TlsConfig, hostname: &str) -> Result<Self> {
        let StreamChannel::Plain(stream) = self else {
            return Err(Error::UnsupportedOperation(
                "STARTTLS already completed on this connection".into(),
            ));
        };

        let server_name = rustls_pki_types::ServerName::try_from(parse_server_name(hostname)?)
            .map_err(|_| Error::Config(format!("'{}' is not a valid TLS server name", hostname)))?;

        let session = tokio_rustls::TlsConnector::from(tls_config.client_config())
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::upgrade(format!("TLS handshake with {} failed: {}", hostname, e)))?;

        Ok(StreamChannel::Tls(Box::new(session)))
    }

    /// `tls-server-end-point` binding (RFC 5929): SHA-256 of the server's
    /// leaf certificate, `None` before STARTTLS
    pub fn tls_server_end_point(&self) -> Option<Vec<u8>> {
        let StreamChannel::Tls(session) = self else {
            return None;
        };
        let leaf = session.get_ref().1.peer_certificates()?.first()?;
        Some(sha2::Sha256::digest(leaf.as_ref()).to_vec())
    }
}

/// ManageSieve over a plain byte stream, upgradable in-band with STARTTLS.
///
/// `connect` always opens a plaintext socket; `secure` records the intent to
/// call [`start_tls`](SieveTransport::start_tls) once the owning client has
/// read the server's capabilities.
pub struct StreamTransport {
    connection: Connection,
    config: TransportConfig,
    connector: Arc<dyn StreamConnector>,
    channel: Option<StreamChannel>,
    read_buf: BytesMut,
    listener: ListenerSlot,
    logger: Arc<dyn TransportLogger>,
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("connection", &self.connection)
            .field("channel", &self.channel)
            .field("buffered", &self.read_buf.len())
            .field("listener", &self.listener)
            .finish()
    }
}

impl StreamTransport {
    /// Create a TCP transport logging through `tracing`
    pub fn new(config: TransportConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector), Arc::new(TracingLogger))
    }

    /// Create a transport with a custom connector and logger
    pub fn with_connector(
        config: TransportConfig,
        connector: Arc<dyn StreamConnector>,
        logger: Arc<dyn TransportLogger>,
    ) -> Self {
        Self {
            read_buf: BytesMut::with_capacity(config.read_buffer_capacity),
            connection: Connection::new(),
            config,
            connector,
            channel: None,
            listener: ListenerSlot::default(),
            logger,
        }
    }

    /// `tls-server-end-point` channel binding of the secured channel
    pub fn channel_binding(&self) -> Option<Vec<u8>> {
        self.channel
            .as_ref()
            .and_then(StreamChannel::tls_server_end_point)
    }

    /// Negotiate STARTTLS and wrap the socket in TLS.
    async fn negotiate_tls(&mut self) -> Result<()> {
        // Bytes read before the upgrade belong to earlier responses
        if !self.read_buf.is_empty() {
            let pending = self.read_buf.split().freeze();
            self.on_receive(&pending);
        }

        if self.logger.is_level_stream() {
            self.logger
                .log_stream(&render_bytes("Client -> Server", STARTTLS_COMMAND));
        }
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        channel.send(STARTTLS_COMMAND).await?;

        let line = self.read_response_line().await?;
        if self.logger.is_level_stream() {
            self.logger
                .log_stream(&render_bytes("Server -> Client", &line));
        }
        // Plaintext after the go-ahead would be processed as if it were protected
        if !self.read_buf.is_empty() {
            return Err(Error::upgrade(
                "server sent unexpected data after the STARTTLS response",
            ));
        }
        check_starttls_response(&line)?;

        let tls_config = match &self.config.tls {
            Some(tls) => tls.clone(),
            None => TlsConfig::builder().build()?,
        };
        let hostname = self
            .connection
            .endpoint()
            .map(|endpoint| endpoint.host().to_string())
            .ok_or(Error::NotConnected)?;

        self.logger.log_state("server accepted STARTTLS, starting TLS handshake");
        let channel = self.channel.take().ok_or(Error::NotConnected)?;
        self.channel = Some(channel.start_tls(&tls_config, &hostname).await?);
        Ok(())
    }

    /// Read one CRLF-terminated response line
    async fn read_response_line(&mut self) -> Result<BytesMut> {
        loop {
            if let Some(pos) = self.read_buf.windows(CRLF.len()).position(|w| w == CRLF) {
                return Ok(self.read_buf.split_to(pos + CRLF.len()));
            }
            if self.read_buf.len() > MAX_RESPONSE_LINE {
                return Err(Error::upgrade("STARTTLS response line too long"));
            }

            let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
            let n = channel.receive(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::upgrade(
                    "connection closed during STARTTLS negotiation",
                ));
            }
        }
    }

    fn on_receive(&self, data: &[u8]) {
        counters::bytes_received(labels::TRANSPORT_STREAM, data.len());
        if self.logger.is_level_stream() {
            self.logger.log_stream(&render_bytes("Server -> Client", data));
        }
        if let Some(listener) = self.listener.get() {
            listener.on_receive(data);
        }
    }

    fn on_error(&self, message: &str) {
        counters::channel_error(labels::TRANSPORT_STREAM);
        self.logger.log_state(&format!("channel error: {}", message));
        if let Some(listener) = self.listener.get() {
            listener.on_error(message);
        }
    }

    async fn on_close(&mut self) {
        self.teardown(Some("connection closed by server")).await;
        if let Some(listener) = self.listener.get() {
            listener.on_disconnect();
        }
    }

    async fn teardown(&mut self, reason: Option<&str>) {
        // A failed handshake consumes the socket while still Upgrading
        let held_channel =
            self.channel.is_some() || self.connection.state() == ConnectionState::Upgrading;
        debug_assert!(!held_channel || self.connection.state().has_channel());
        self.connection.begin_teardown(reason, self.logger.as_ref());

        if !held_channel {
            self.logger.log_state("no channel to close");
            return;
        }

        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                tracing::debug!(error = %e, "stream shutdown failed");
            }
        }
        self.read_buf.clear();
        counters::connection_closed(labels::TRANSPORT_STREAM);

        if let Some(listener) = self.listener.get() {
            listener.on_disconnected();
        }
    }
}

async fn open_stream(
    connector: &dyn StreamConnector,
    endpoint: &Endpoint,
    connect_timeout: Option<Duration>,
) -> Result<BoxedStream> {
    let connect = connector.connect(endpoint.host(), endpoint.port());
    match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connecting to {} timed out after {:?}", endpoint, limit),
            ))
        })?,
        None => connect.await,
    }
}

/// Accept an `OK` response, reject `NO`/`BYE` and anything else
fn check_starttls_response(line: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end();
    let tag = text.split_whitespace().next().unwrap_or_default();

    if tag.eq_ignore_ascii_case(status::OK) {
        Ok(())
    } else if tag.eq_ignore_ascii_case(status::NO) || tag.eq_ignore_ascii_case(status::BYE) {
        Err(Error::upgrade(format!("server refused STARTTLS: {}", text)))
    } else {
        Err(Error::upgrade(format!(
            "unexpected STARTTLS response: {}",
            text
        )))
    }
}

#[async_trait]
impl SieveTransport for StreamTransport {
    async fn connect(&mut self, url: &str, secure: bool) -> Result<()> {
        let endpoint = Endpoint::parse(url)?;

        if self.channel.is_some() {
            self.logger
                .log_state("connect called with an open channel, keeping it");
            return Ok(());
        }

        let span = tracing::info_span!(
            "connect",
            transport = labels::TRANSPORT_STREAM,
            host = %endpoint.host(),
            port = endpoint.port()
        );

        async {
            let started = Instant::now();
            self.connection.begin_connect(endpoint.clone(), secure)?;
            self.logger
                .log_state(&format!("connecting to {} (plaintext)", endpoint));

            let connector = self.connector.clone();
            let stream =
                match open_stream(connector.as_ref(), &endpoint, self.config.connect_timeout).await
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            retryable = e.is_retryable(),
                            "connect failed"
                        );
                        let _ = self.connection.transition(ConnectionState::Disconnected);
                        return Err(e);
                    }
                };

            self.channel = Some(StreamChannel::Plain(stream));
            self.read_buf.clear();
            self.connection.transition(ConnectionState::Connected)?;

            counters::connection_opened(labels::TRANSPORT_STREAM, secure);
            histograms::connect_duration(
                labels::TRANSPORT_STREAM,
                started.elapsed().as_millis() as u64,
            );
            self.logger.log_state(&format!("connected to {}", endpoint));
            tracing::info!("stream connected");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn disconnect(&mut self, reason: Option<&str>) {
        self.teardown(reason).await;
    }

    async fn start_tls(&mut self) -> Result<()> {
        if self.channel.is_none() {
            return Err(Error::NotConnected);
        }
        if !self.connection.is_secure() {
            return Err(Error::InvalidState {
                expected: "security requested at connect".into(),
                actual: "plaintext connection".into(),
            });
        }
        self.connection.transition(ConnectionState::Upgrading)?;

        counters::upgrade_attempted();
        let started = Instant::now();

        let span = tracing::info_span!("start_tls");
        let negotiation = async {
            match self.config.upgrade_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.negotiate_tls()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::upgrade(format!(
                        "STARTTLS timed out after {:?}",
                        limit
                    ))),
                },
                None => self.negotiate_tls().await,
            }
        }
        .instrument(span)
        .await;

        match negotiation {
            Ok(()) => {
                self.connection.mark_secured()?;
                counters::upgrade_completed(labels::OUTCOME_SUCCESS);
                histograms::upgrade_duration(started.elapsed().as_millis() as u64);
                self.logger.log_state("channel secured via STARTTLS");
                tracing::info!("TLS connection established");
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    Error::UpgradeFailure(_) => e,
                    other => Error::upgrade(other),
                };
                counters::upgrade_failed(err.category());
                tracing::warn!(error = %err, "STARTTLS failed, tearing down");
                self.teardown(Some("security upgrade failed")).await;
                Err(err)
            }
        }
    }

    async fn on_send(&mut self, data: &[u8]) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        if self.logger.is_level_stream() {
            self.logger.log_stream(&render_bytes("Client -> Server", data));
        }
        channel.send(data).await?;
        counters::bytes_sent(labels::TRANSPORT_STREAM, data.len());
        Ok(())
    }

    async fn process_event(&mut self) -> bool {
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };

        self.read_buf.reserve(self.config.read_buffer_capacity);
        let read = channel.receive(&mut self.read_buf).await;
        match read {
            Ok(0) => self.on_close().await,
            Ok(_) => {
                let data = self.read_buf.split().freeze();
                self.on_receive(&data);
            }
            Err(e) => {
                self.on_error(&e.to_string());
                self.on_close().await;
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_starttls_response_ok() {
        assert!(check_starttls_response(b"OK\r\n").is_ok());
        assert!(check_starttls_response(b"OK \"Begin TLS negotiation now\"\r\n").is_ok());
        assert!(check_starttls_response(b"ok\r\n").is_ok());
    }

    #[test]
    fn test_check_starttls_response_refused() {
        let err = check_starttls_response(b"NO \"TLS unavailable\"\r\n").unwrap_err();
        assert!(matches!(err, Error::UpgradeFailure(ref m) if m.contains("refused")));

        let err = check_starttls_response(b"BYE \"shutting down\"\r\n").unwrap_err();
        assert!(matches!(err, Error::UpgradeFailure(_)));
    }

    #[test]
    fn test_check_starttls_response_garbage() {
        let err = check_starttls_response(b"\"IMPLEMENTATION\" \"x\"\r\n").unwrap_err();
        assert!(matches!(err, Error::UpgradeFailure(ref m) if m.contains("unexpected")));
        assert!(check_starttls_response(b"\r\n").is_err());
    }

    #[tokio::test]
    async fn test_start_tls_before_connect() {
        let mut transport = StreamTransport::new(TransportConfig::default());
        assert!(matches!(
            transport.start_tls().await,
            Err(Error::NotConnected)
        ));
        assert_eq!(transport.connection().state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_on_send_before_connect_fails() {
        let mut transport = StreamTransport::new(TransportConfig::default());
        assert!(matches!(
            transport.on_send(b"CAPABILITY\r\n").await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_process_event_without_channel() {
        let mut transport = StreamTransport::new(TransportConfig::default());
        assert!(!transport.process_event().await);
    }

    #[tokio::test]
    async fn test_connect_invalid_url() {
        let mut transport = StreamTransport::new(TransportConfig::default());
        let result = transport.connect("sieve://:4190", false).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
        assert!(transport.connection().endpoint().is_none());
    }

    struct MockConnector(std::sync::Mutex<Option<tokio_test::io::Mock>>);

    #[async_trait]
    impl StreamConnector for MockConnector {
        async fn connect(&self, _host: &str, _port: u16) -> Result<BoxedStream> {
            let mock = self.0.lock().unwrap().take().ok_or(Error::NotConnected)?;
            Ok(Box::new(mock))
        }
    }

    #[tokio::test]
    async fn test_exchange_then_eof() {
        let mock = tokio_test::io::Builder::new()
            .read(b"OK\r\n")
            .write(b"NOOP\r\n")
            .build();
        let connector = Arc::new(MockConnector(std::sync::Mutex::new(Some(mock))));
        let mut transport = StreamTransport::with_connector(
            TransportConfig::default(),
            connector,
            Arc::new(TracingLogger),
        );

        transport
            .connect("sieve://mail.example.com:4190", false)
            .await
            .unwrap();
        assert!(transport.process_event().await);
        transport.on_send(b"NOOP\r\n").await.unwrap();

        // Script exhausted: the mock reports EOF
        assert!(transport.process_event().await);
        assert_eq!(transport.connection().state(), ConnectionState::Disconnected);
        assert!(!transport.process_event().await);
    }

    #[tokio::test]
    async fn test_plain_channel_has_no_binding() {
        let (client, _server) = tokio::io::duplex(64);
        let channel = StreamChannel::Plain(Box::new(client));
        assert!(!channel.is_tls());
        assert!(channel.tls_server_end_point().is_none());
    }
}
