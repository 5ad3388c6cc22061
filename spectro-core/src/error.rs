//! Error types for spectro-core

use spectro_types::OperationalStatus;

/// Result type alias for spectro-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
///
/// Decoding an instrument response never produces one of these: decoders
/// always return a populated status. These errors cover frame-level
/// failures, state-machine violations and requests a family cannot encode.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },
    
    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },
    
    /// Frame does not follow the family's framing rules
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    
    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),
    
    /// Session not initialized
    #[error("Session not initialized - call initialize() first")]
    NotInitialized,
    
    /// Session already disposed
    #[error("Session already disposed")]
    AlreadyDisposed,
    
    /// Another operation is in flight
    #[error("Session busy ({0}) - operations are not queued")]
    Busy(OperationalStatus),
    
    /// Operation has no command in this family
    #[error("Operation {operation} not supported by {family}")]
    NotSupported {
        family: String,
        operation: String,
    },
    
    /// Command parameter cannot be encoded
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    
    /// Value object error
    #[error("Type error: {0}")]
    Types(#[from] spectro_types::Error),
}

impl Error {
    pub(crate) fn not_supported(family: &str, operation: impl std::fmt::Display) -> Self {
        Self::NotSupported {
            family: family.to_string(),
            operation: operation.to_string(),
        }
    }
    
    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
    
    /// Check if error requires the session to be initialized again
    pub fn requires_reinitialize(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::AlreadyDisposed
                | Self::InvalidSessionState(_)
        )
    }
}
