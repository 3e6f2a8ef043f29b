//! Byte stream connectors

use crate::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Combined trait for async read + write
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

/// Plaintext byte stream a [`StreamTransport`](super::StreamTransport) wraps
pub type BoxedStream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Opens plaintext byte streams
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open a stream to `host:port`
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream>;
}

/// TCP connector
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl StreamConnector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
