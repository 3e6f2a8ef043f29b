//! Listener notified of transport-level events

use std::sync::{Arc, Weak};

/// Observer supplied by the owning client.
///
/// Every hook is optional; the default bodies do nothing. Transports keep
/// only a [`Weak`] reference, so a listener that has been dropped is simply
/// skipped.
pub trait TransportListener: Send + Sync {
    /// Inbound data delivered by the channel
    fn on_receive(&self, data: &[u8]) {
        let _ = data;
    }

    /// The channel reported an error. Non-fatal by itself.
    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// The channel closed on its own (not at the caller's request)
    fn on_disconnect(&self) {}

    /// Teardown released the channel
    fn on_disconnected(&self) {}
}

/// Weak back reference to the attached listener
#[derive(Default, Clone)]
pub(crate) struct ListenerSlot(Option<Weak<dyn TransportListener>>);

impl ListenerSlot {
    pub(crate) fn set(&mut self, listener: Weak<dyn TransportListener>) {
        self.0 = Some(listener);
    }

    /// The listener, if one is attached and still alive
    pub(crate) fn get(&self) -> Option<Arc<dyn TransportListener>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.0 {
            None => "none",
            Some(weak) if weak.strong_count() > 0 => "attached",
            Some(_) => "dropped",
        };
        f.debug_tuple("ListenerSlot").field(&state).finish()
    }
}
