//! Network primitives a [`Machine`](crate::Machine) suspends on.

use async_trait::async_trait;
use harpy_core::wire::response_complete;
use std::io;
use std::net::IpAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};

/// Default buffer size for reads
const BUFFER_SIZE: usize = 8192;

/// Largest response a [`TokioScheduler`] buffers unless told otherwise.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// The five operations a request replay needs from the network.
///
/// Every call may suspend; nothing else in a machine does.
#[async_trait]
pub trait Scheduler: Send + Sync {
    type Conn: Send;

    async fn resolve(&self, host: &str) -> io::Result<IpAddr>;

    async fn connect(&self, addr: IpAddr, port: u16) -> io::Result<Self::Conn>;

    async fn write(&self, conn: &mut Self::Conn, bytes: &[u8]) -> io::Result<()>;

    /// Read one complete response.
    async fn read(&self, conn: &mut Self::Conn) -> io::Result<Vec<u8>>;

    async fn close(&self, conn: Self::Conn) -> io::Result<()>;
}

/// [`Scheduler`] over tokio's TCP sockets and resolver.
#[derive(Debug, Clone, Copy)]
pub struct TokioScheduler {
    max_response_bytes: usize,
}

impl TokioScheduler {
    /// A scheduler whose reads fail once a response grows past `max_response_bytes`.
    pub fn new(max_response_bytes: usize) -> Self {
        Self { max_response_bytes }
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESPONSE_BYTES)
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    type Conn = TcpStream;

    async fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(addr);
        }

        lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no addresses found for '{}'", host),
                )
            })
    }

    async fn connect(&self, addr: IpAddr, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((addr, port)).await?;
        stream.set_nodelay(true)?;
        tracing::trace!("Connected to {}:{}", addr, port);
        Ok(stream)
    }

    async fn write(&self, conn: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
        conn.write_all(bytes).await?;
        conn.flush().await
    }

    async fn read(&self, conn: &mut TcpStream) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(BUFFER_SIZE);
        let mut chunk = [0u8; BUFFER_SIZE];

        loop {
            let n = conn.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            if buffer.len() + n > self.max_response_bytes {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("response exceeds {} bytes", self.max_response_bytes),
                ));
            }
            buffer.extend_from_slice(&chunk[..n]);

            if response_complete(&buffer) {
                break;
            }
        }

        if buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before any response was received",
            ));
        }

        tracing::trace!("Read {} response bytes", buffer.len());
        Ok(buffer)
    }

    async fn close(&self, mut conn: TcpStream) -> io::Result<()> {
        match conn.shutdown().await {
            // the peer may already have closed its side
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            result => result,
        }
    }
}
