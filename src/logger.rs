//! Logger contract
//!
//! Two independent channels: state transitions, and raw payload dumps. The
//! payload channel is gated by [`TransportLogger::is_level_stream`] so byte
//! rendering is skipped when nobody is listening.

use std::fmt::Write;
use tracing::Level;

/// Diagnostic sink supplied by the owning client
pub trait TransportLogger: Send + Sync {
    /// Lifecycle and state transition message
    fn log_state(&self, message: &str);

    /// Raw payload dump
    fn log_stream(&self, message: &str);

    /// Whether the payload channel is active
    fn is_level_stream(&self) -> bool;
}

/// Logger backed by `tracing`
///
/// State messages are emitted at `DEBUG`, payload dumps at `TRACE`. The
/// payload channel is active when `TRACE` is enabled for this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TransportLogger for TracingLogger {
    fn log_state(&self, message: &str) {
        tracing::debug!(target: "sieve_transport::state", "{}", message);
    }

    fn log_stream(&self, message: &str) {
        tracing::trace!(target: "sieve_transport::stream", "{}", message);
    }

    fn is_level_stream(&self) -> bool {
        tracing::enabled!(target: "sieve_transport::stream", Level::TRACE)
    }
}

/// Render a payload as a byte array for the stream channel
pub(crate) fn render_bytes(direction: &str, data: &[u8]) -> String {
    let mut out = String::with_capacity(direction.len() + 16 + data.len() * 4);
    let _ = write!(out, "{} [Byte Array]:\n[", direction);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", byte);
    }
    out.push(']');
    out
}
