//! ManageSieve transport constants

/// Connection URL scheme
pub const SCHEME_SIEVE: &str = "sieve";

/// Plain WebSocket scheme
pub const SCHEME_WS: &str = "ws";

/// Secure WebSocket scheme
pub const SCHEME_WSS: &str = "wss";

/// IANA-assigned ManageSieve port
pub const DEFAULT_PORT: u16 = 4190;

/// In-band upgrade command
pub const STARTTLS_COMMAND: &[u8] = b"STARTTLS\r\n";

/// Line terminator of ManageSieve responses
pub const CRLF: &[u8] = b"\r\n";

/// Longest STARTTLS response line accepted before giving up
pub const MAX_RESPONSE_LINE: usize = 8192;

/// Default inbound buffer capacity
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 8192;

/// Default largest WebSocket message (16 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 << 20;

/// Default largest WebSocket frame (4 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 << 20;

/// ManageSieve response status tags
pub mod status {
    /// Command succeeded
    pub const OK: &str = "OK";

    /// Command failed
    pub const NO: &str = "NO";

    /// Server is closing the connection
    pub const BYE: &str = "BYE";
}
