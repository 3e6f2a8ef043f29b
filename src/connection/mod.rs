//! Connection management
//!
//! This module handles:
//! * Connection URL parsing (`sieve://host:port[/path]`)
//! * The connection record and its security flags
//! * State machine enforcement
//! * Transport and TLS configuration

mod config;
mod conn;
mod endpoint;
mod state;
mod tls;

pub use config::{TransportConfig, TransportConfigBuilder};
pub use conn::Connection;
pub use endpoint::Endpoint;
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
