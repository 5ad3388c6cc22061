//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Scripted transport was told to fail
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl Error {
    /// Check if the error is a read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout | Self::ConnectionTimeout)
    }

    /// Check if the connection is unusable and must be reopened
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionClosed | Self::Io(_)
        )
    }
}
