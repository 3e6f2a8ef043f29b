//! Connection URL parsing
//!
//! Supports the format `sieve://host:port[/path]`:
//! * host must be non-empty and must not contain `:`
//! * port is one or more digits in the range 1-65535
//! * path is everything after the first `/` following the port

use crate::transport::constants::{SCHEME_SIEVE, SCHEME_WS, SCHEME_WSS};
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Parsed connection endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    path: Option<String>,
}

impl Endpoint {
    /// Parse a `sieve://host:port[/path]` URL
    pub fn parse(url: &str) -> Result<Self> {
        let prefix = format!("{}://", SCHEME_SIEVE);
        let rest = match url.get(..prefix.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(&prefix) => &url[prefix.len()..],
            _ => {
                return Err(Error::InvalidUrl(format!(
                    "'{}' must start with {}",
                    url, prefix
                )))
            }
        };

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path.to_string())),
            None => (rest, None),
        };

        let (host, port) = authority
            .split_once(':')
            .ok_or_else(|| Error::InvalidUrl(format!("'{}' is missing a port", url)))?;

        if host.is_empty() {
            return Err(Error::InvalidUrl(format!("'{}' has an empty host", url)));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(Error::InvalidUrl(format!(
                "'{}' has whitespace in the host",
                url
            )));
        }

        let port = parse_port(port).ok_or_else(|| {
            Error::InvalidUrl(format!("'{}' has an invalid port '{}'", url, port))
        })?;

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Sub-path following the port, if the URL had one
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Address of the underlying WebSocket channel
    ///
    /// Secure requests use `wss://`, plain requests `ws://`.
    pub fn channel_address(&self, secure: bool) -> String {
        let scheme = if secure { SCHEME_WSS } else { SCHEME_WS };
        format!(
            "{}://{}:{}/{}",
            scheme,
            self.host,
            self.port,
            self.path.as_deref().unwrap_or_default()
        )
    }
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", SCHEME_SIEVE, self.host, self.port)?;
        if let Some(path) = &self.path {
            write!(f, "/{}", path)?;
        }
        Ok(())
    }
}
