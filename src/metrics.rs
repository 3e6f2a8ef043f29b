//! Metrics facade
//!
//! Thin wrappers over the `metrics` crate so call sites stay one-liners.
//! Nothing is recorded unless the embedding application installs a recorder.

/// Label values
pub mod labels {
    /// WebSocket transport
    pub const TRANSPORT_WEBSOCKET: &str = "websocket";
    /// Stream (TCP) transport
    pub const TRANSPORT_STREAM: &str = "stream";

    /// Upgrade completed
    pub const OUTCOME_SUCCESS: &str = "success";
    /// Upgrade failed
    pub const OUTCOME_FAILURE: &str = "failure";
}

/// Counters
pub mod counters {
    use metrics::counter;

    /// A channel was opened
    pub fn connection_opened(transport: &'static str, secure: bool) {
        counter!(
            "sieve_transport_connections_opened_total",
            "transport" => transport,
            "secure" => if secure { "true" } else { "false" }
        )
        .increment(1);
    }

    /// A channel was released by teardown
    pub fn connection_closed(transport: &'static str) {
        counter!("sieve_transport_connections_closed_total", "transport" => transport)
            .increment(1);
    }

    /// The channel reported an error
    pub fn channel_error(transport: &'static str) {
        counter!("sieve_transport_channel_errors_total", "transport" => transport).increment(1);
    }

    /// An in-band upgrade was attempted
    pub fn upgrade_attempted() {
        counter!("sieve_transport_upgrades_attempted_total").increment(1);
    }

    /// An in-band upgrade finished
    pub fn upgrade_completed(outcome: &'static str) {
        counter!("sieve_transport_upgrades_total", "outcome" => outcome).increment(1);
    }

    /// An in-band upgrade failed; `error` is an [`Error::category`](crate::Error::category)
    pub fn upgrade_failed(error: &'static str) {
        counter!(
            "sieve_transport_upgrades_total",
            "outcome" => super::labels::OUTCOME_FAILURE,
            "error" => error
        )
        .increment(1);
    }

    /// Bytes written to a channel
    pub fn bytes_sent(transport: &'static str, bytes: usize) {
        counter!("sieve_transport_bytes_sent_total", "transport" => transport)
            .increment(bytes as u64);
    }

    /// Bytes delivered from a channel
    pub fn bytes_received(transport: &'static str, bytes: usize) {
        counter!("sieve_transport_bytes_received_total", "transport" => transport)
            .increment(bytes as u64);
    }
}

/// Histograms
pub mod histograms {
    use metrics::histogram;

    /// Time from `connect()` to an open channel, in milliseconds
    pub fn connect_duration(transport: &'static str, millis: u64) {
        histogram!("sieve_transport_connect_duration_ms", "transport" => transport)
            .record(millis as f64);
    }

    /// Time spent in STARTTLS negotiation, in milliseconds
    pub fn upgrade_duration(millis: u64) {
        histogram!("sieve_transport_upgrade_duration_ms").record(millis as f64);
    }
}
