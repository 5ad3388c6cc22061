//! Transport layer for spectrophotometer drivers
//!
//! Provides byte-stream communication with instruments over TCP (serial
//! servers and networked benchtops), local serial ports (`serial` feature)
//! and a scripted in-memory transport for tests and demos.

pub mod error;
pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
pub use mock::MockTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Byte-stream transport to one instrument
///
/// Framing is not a transport concern: `receive` returns whatever bytes
/// arrived next and the caller decides when a response is complete.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection
    async fn connect(&mut self) -> Result<()>;

    /// Close the connection; closing a closed transport is a no-op
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Write raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read the next chunk of bytes, waiting at most `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadTimeout`] when nothing arrives in time and
    /// [`Error::ConnectionClosed`] when the peer closed the stream.
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Drop input that has already arrived and nobody read
    ///
    /// Returns the number of bytes discarded. Bytes still on their way are
    /// not waited for beyond a short quiet window.
    async fn discard_input(&mut self) -> Result<usize>;

    /// Human-readable peer description used in logs
    fn remote_addr(&self) -> String;
}
