//! Serial port transport (`serial` feature)

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

const READ_CHUNK: usize = 256;

/// Line silence that ends a drain
const DRAIN_QUIET: Duration = Duration::from_millis(50);

const DRAIN_LIMIT: usize = 16 * 1024;

/// RS-232 / USB-serial transport, 8 data bits, no parity, one stop bit
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    flow_control: tokio_serial::FlowControl,
    port: Option<SerialStream>,
}

impl SerialTransport {
    /// Create a transport for `path` (e.g. `/dev/ttyUSB0` or `COM3`)
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            flow_control: tokio_serial::FlowControl::None,
            port: None,
        }
    }

    /// Use RTS/CTS hardware flow control
    pub fn with_hardware_flow_control(mut self) -> Self {
        self.flow_control = tokio_serial::FlowControl::Hardware;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Opening {} at {} baud", self.path, self.baud_rate);

        let port = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(self.flow_control)
            .open_native_async()
            .map_err(|e| Error::Serial(format!("{}: {}", self.path, e)))?;

        self.port = Some(port);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.path);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let n = timeout(wait, port.read_buf(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(Error::Io)?;

        if n == 0 {
            self.port = None;
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {:02X?}", n, &buf[..n.min(16)]);
        Ok(buf)
    }

    async fn discard_input(&mut self) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let mut scratch = BytesMut::with_capacity(READ_CHUNK);
        let mut discarded = 0;

        while discarded < DRAIN_LIMIT {
            match timeout(DRAIN_QUIET, port.read_buf(&mut scratch)).await {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    discarded += n;
                    scratch.clear();
                }
                Ok(Err(e)) => return Err(Error::Io(e)),
            }
        }

        if discarded > 0 {
            debug!("Discarded {} unread bytes on {}", discarded, self.path);
        }
        Ok(discarded)
    }

    fn remote_addr(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport dropped while {} still open", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_transport_create() {
        let transport = SerialTransport::new("/dev/ttyUSB0", 9600);
        assert!(!transport.is_connected());
        assert_eq!(transport.remote_addr(), "/dev/ttyUSB0@9600");
    }

    #[tokio::test]
    async fn test_serial_missing_port() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-spectro", 9600);
        assert!(matches!(transport.connect().await, Err(Error::Serial(_))));
    }
}
