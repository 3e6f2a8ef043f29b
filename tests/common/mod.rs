//! Shared fakes for transport integration tests

#![allow(dead_code)]

use bytes::Bytes;
use sieve_transport::transport::{Channel, ChannelEvent, ChannelEvents, ChannelFactory};
use sieve_transport::{Result, TransportConfig, TransportListener, TransportLogger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

/// Install a fmt subscriber honoring `RUST_LOG` (once per test binary)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Channel factory whose channels are driven by the test
#[derive(Default)]
pub struct FakeFactory {
    channels: Mutex<Vec<FakeHandle>>,
}

/// Test-side view of one fake channel
#[derive(Clone)]
pub struct FakeHandle {
    pub address: String,
    events: mpsc::UnboundedSender<ChannelEvent>,
    sent: Arc<Mutex<Vec<Bytes>>>,
    closes: Arc<AtomicUsize>,
}

impl FakeHandle {
    /// Fire an event on the channel
    pub fn fire(&self, event: ChannelEvent) {
        // The transport may already have dropped its subscription
        let _ = self.events.send(event);
    }

    /// Everything the transport sent
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of close() calls
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether the transport still listens for events
    pub fn subscribed(&self) -> bool {
        !self.events.is_closed()
    }
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of channels opened so far
    pub fn opened(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    /// Most recently opened channel
    pub fn last(&self) -> FakeHandle {
        self.channels
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no channel opened")
    }
}

struct FakeChannel {
    sent: Arc<Mutex<Vec<Bytes>>>,
    closes: Arc<AtomicUsize>,
}

impl Channel for FakeChannel {
    fn send(&mut self, data: Bytes) -> Result<()> {
        self.sent.lock().unwrap().push(data);
        Ok(())
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChannelFactory for FakeFactory {
    fn open(
        &self,
        address: &str,
        _config: &TransportConfig,
    ) -> Result<(Box<dyn Channel>, ChannelEvents)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = FakeHandle {
            address: address.to_string(),
            events: tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        let channel = FakeChannel {
            sent: handle.sent.clone(),
            closes: handle.closes.clone(),
        };
        self.channels.lock().unwrap().push(handle);
        Ok((Box::new(channel), rx))
    }
}

/// Listener recording every notification
#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<u8>>,
    errors: Mutex<Vec<String>>,
    disconnect: AtomicUsize,
    disconnected: AtomicUsize,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnect.load(Ordering::SeqCst)
    }

    pub fn disconnected_count(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl TransportListener for RecordingListener {
    fn on_receive(&self, data: &[u8]) {
        self.received.lock().unwrap().extend_from_slice(data);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn on_disconnect(&self) {
        self.disconnect.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnected(&self) {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
    }
}

/// Weak handle for `SieveTransport::set_listener`
pub fn weak(listener: &Arc<RecordingListener>) -> Weak<dyn TransportListener> {
    let weak: Weak<RecordingListener> = Arc::downgrade(listener);
    weak
}

/// Logger recording both channels
pub struct RecordingLogger {
    stream_enabled: bool,
    states: Mutex<Vec<String>>,
    streams: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn new(stream_enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            stream_enabled,
            states: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        })
    }

    pub fn states(&self) -> Vec<String> {
        self.states.lock().unwrap().clone()
    }

    pub fn streams(&self) -> Vec<String> {
        self.streams.lock().unwrap().clone()
    }
}

impl TransportLogger for RecordingLogger {
    fn log_state(&self, message: &str) {
        self.states.lock().unwrap().push(message.to_string());
    }

    fn log_stream(&self, message: &str) {
        self.streams.lock().unwrap().push(message.to_string());
    }

    fn is_level_stream(&self) -> bool {
        self.stream_enabled
    }
}
