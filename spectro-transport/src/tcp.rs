//! TCP transport
//!
//! Benchtop instruments with an Ethernet port, and serial instruments behind
//! a serial-to-network server, expose their command channel as a raw TCP
//! stream.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

const READ_CHUNK: usize = 1024;

/// Silence that ends a drain
const DRAIN_QUIET: Duration = Duration::from_millis(20);

/// Upper bound on bytes dropped by one drain
const DRAIN_LIMIT: usize = 64 * 1024;

/// TCP transport for network-attached instruments
pub struct TcpTransport {
    host: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket_addr: None,
            stream: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve host to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let target = format!("{}:{}", self.host, self.port);

        let addr = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", target, e)))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", target)))?;

        self.socket_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Commands are a handful of bytes
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());
            let _ = stream.shutdown().await;
        }

        self.socket_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(READ_CHUNK);

        let n = timeout(wait, stream.read_buf(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(Error::Io)?;

        if n == 0 {
            // The peer is gone; a later connect() starts fresh
            self.stream = None;
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {:02X?}", n, &buf[..n.min(16)]);

        Ok(buf)
    }

    async fn discard_input(&mut self) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut scratch = BytesMut::with_capacity(READ_CHUNK);
        let mut discarded = 0;

        while discarded < DRAIN_LIMIT {
            match timeout(DRAIN_QUIET, stream.read_buf(&mut scratch)).await {
                Err(_) => break,
                Ok(Ok(0)) => {
                    self.stream = None;
                    return Err(Error::ConnectionClosed);
                }
                Ok(Ok(n)) => {
                    discarded += n;
                    scratch.clear();
                }
                Ok(Err(e)) => return Err(Error::Io(e)),
            }
        }

        if discarded > 0 {
            debug!("Discarded {} unread bytes from {}", discarded, self.remote_addr());
        }
        Ok(discarded)
    }

    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.50", 4001);
        assert!(!transport.is_connected());
        assert_eq!(transport.remote_addr(), "192.168.1.50:4001");
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let mut transport = TcpTransport::new("invalid..address", 4001)
            .with_connect_timeout(Duration::from_millis(100));

        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_tcp_transport_not_connected() {
        let mut transport = TcpTransport::new("127.0.0.1", 4001);
        assert!(matches!(transport.send(b"MES\r\n").await, Err(Error::NotConnected)));
        assert!(matches!(
            transport.receive(Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_tcp_transport_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 5];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(&request, b"IDR\r\n");
            socket.write_all(b"OK00,CM-2600d,1.10,1\r\n").await.unwrap();
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();
        assert!(matches!(transport.connect().await, Err(Error::AlreadyConnected)));

        transport.send(b"IDR\r\n").await.unwrap();

        let mut received = BytesMut::new();
        while !received.ends_with(b"\r\n") {
            received.extend_from_slice(&transport.receive(Duration::from_secs(2)).await.unwrap());
        }
        assert_eq!(&received[..], b"OK00,CM-2600d,1.10,1\r\n");

        server.await.unwrap();

        // Server side has closed
        assert!(matches!(
            transport.receive(Duration::from_secs(2)).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_tcp_transport_discards_unread_input() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"OK00,55.10\r\n").await.unwrap();

            let mut request = [0u8; 5];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(b"OK00\r\n").await.unwrap();
            socket
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.discard_input().await.unwrap(), 12);
        assert_eq!(transport.discard_input().await.unwrap(), 0);

        transport.send(b"CWR\r\n").await.unwrap();
        let reply = transport.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(&reply[..], b"OK00\r\n");

        transport.disconnect().await.unwrap();
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_tcp_transport_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();

        assert!(matches!(
            transport.receive(Duration::from_millis(50)).await,
            Err(Error::ReadTimeout)
        ));

        transport.disconnect().await.unwrap();
        server.await.unwrap();
    }
}
