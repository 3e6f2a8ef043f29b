//! Message channel abstraction
//!
//! A [`ChannelFactory`] opens a [`Channel`] and hands back the receiving end
//! of its event subscription. Events arrive in order: `Open` at most once,
//! then any number of `Message`/`Error`, then `Close` at most once.

use crate::connection::TransportConfig;
use crate::{Error, Result};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Inbound payload as delivered by the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
}

impl Payload {
    /// Payload as a byte sequence
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Text(text) => Bytes::from(text),
            Payload::Binary(data) => data,
        }
    }
}

/// Event emitted by a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Channel finished opening
    Open,
    /// Inbound message
    Message(Payload),
    /// Channel-level error (non-fatal by itself)
    Error(String),
    /// Channel closed
    Close,
}

/// Receiving end of a channel's event subscription
pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Handle to an open (or opening) message channel
pub trait Channel: Send {
    /// Queue `data` for transmission.
    ///
    /// Data sent before the channel opens is held until it does.
    fn send(&mut self, data: Bytes) -> Result<()>;

    /// Close the channel. Closing an opening channel aborts the handshake.
    fn close(&mut self);
}

/// Creates channels for a transport
pub trait ChannelFactory: Send + Sync {
    /// Start opening a channel to `address` (`ws://` or `wss://`).
    ///
    /// Must not wait for the channel to open; completion is reported through
    /// [`ChannelEvent::Open`].
    fn open(
        &self,
        address: &str,
        config: &TransportConfig,
    ) -> Result<(Box<dyn Channel>, ChannelEvents)>;
}

/// WebSocket channels backed by `tokio-tungstenite`
///
/// Each channel runs on its own task. Must be used from within a Tokio
/// runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteFactory;

impl ChannelFactory for TungsteniteFactory {
    fn open(
        &self,
        address: &str,
        config: &TransportConfig,
    ) -> Result<(Box<dyn Channel>, ChannelEvents)> {
        let request = address.into_client_request()?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_frame_size);

        // wss:// without explicit TLS settings uses the bundled webpki roots
        let connector = match &config.tls {
            Some(tls) if request.uri().scheme_str() == Some("wss") => {
                Some(Connector::Rustls(tls.client_config()))
            }
            _ => None,
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();

        debug!(address, "opening websocket channel");
        tokio::spawn(run_channel(
            request,
            ws_config,
            connector,
            config.connect_timeout,
            outbound_rx,
            close_rx,
            event_tx,
        ));

        let channel = TungsteniteChannel {
            outbound: outbound_tx,
            close: Some(close_tx),
        };
        Ok((Box::new(channel), event_rx))
    }
}

struct TungsteniteChannel {
    outbound: mpsc::UnboundedSender<Bytes>,
    close: Option<oneshot::Sender<()>>,
}

impl Channel for TungsteniteChannel {
    fn send(&mut self, data: Bytes) -> Result<()> {
        if self.close.is_none() {
            return Err(Error::ConnectionClosed);
        }
        self.outbound
            .send(data)
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open_socket(
    request: Request,
    ws_config: WebSocketConfig,
    connector: Option<Connector>,
    connect_timeout: Option<Duration>,
) -> Result<Socket> {
    let connect = connect_async_tls_with_config(request, Some(ws_config), true, connector);
    let (socket, _response) = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| Error::Channel(format!("opening channel timed out after {:?}", limit)))??,
        None => connect.await?,
    };
    Ok(socket)
}

/// Channel task: open, then shuttle frames until either side closes.
async fn run_channel(
    request: Request,
    ws_config: WebSocketConfig,
    connector: Option<Connector>,
    connect_timeout: Option<Duration>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    mut close: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let socket = tokio::select! {
        _ = &mut close => {
            debug!("channel closed before it opened");
            return;
        }
        result = open_socket(request, ws_config, connector, connect_timeout) => match result {
            Ok(socket) => socket,
            Err(e) => {
                debug!(error = %e, "websocket handshake failed");
                let _ = events.send(ChannelEvent::Error(e.to_string()));
                let _ = events.send(ChannelEvent::Close);
                return;
            }
        }
    };

    let _ = events.send(ChannelEvent::Open);
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            _ = &mut close => {
                // Local close: the transport already dropped its subscription
                let _ = sink.close().await;
                return;
            }
            Some(data) = outbound.recv() => {
                trace!(bytes = data.len(), "sending frame");
                if let Err(e) = sink.send(into_message(data)).await {
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    break;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ChannelEvent::Message(Payload::Text(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(ChannelEvent::Message(Payload::Binary(Bytes::from(data))));
                }
                // Ping, pong and close frames are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => break,
                Some(Err(e)) => {
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    debug!("websocket channel closed by peer");
    let _ = events.send(ChannelEvent::Close);
}

/// Text frame for UTF-8 data, binary frame otherwise
fn into_message(data: Bytes) -> Message {
    match String::from_utf8(data.to_vec()) {
        Ok(text) => Message::Text(text),
        Err(e) => Message::Binary(e.into_bytes()),
    }
}
