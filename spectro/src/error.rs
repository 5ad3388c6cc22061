//! High-level error types

use spectro_types::OperationalStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(spectro_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] spectro_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] spectro_types::Error),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Session not initialized - call initialize() first")]
    NotInitialized,

    #[error("Session already disposed")]
    AlreadyDisposed,

    #[error("Session busy ({0}) - operations are not queued")]
    Busy(OperationalStatus),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid response from instrument: {0}")]
    InvalidResponse(String),

    /// Vendor library call could not complete
    #[error("Native library error: {0}")]
    Native(String),
}

impl From<spectro_core::Error> for Error {
    fn from(err: spectro_core::Error) -> Self {
        use spectro_core::Error as Core;

        match err {
            Core::NotInitialized => Self::NotInitialized,
            Core::AlreadyDisposed => Self::AlreadyDisposed,
            Core::Busy(state) => Self::Busy(state),
            Core::NotSupported { family, operation } => {
                Self::NotSupported(format!("{} on {}", operation, family))
            }
            Core::InvalidParameter(detail) => Self::InvalidParameter(detail),
            Core::Types(err) => Self::Types(err),
            other => Self::Core(other),
        }
    }
}

impl Error {
    /// Check if a later attempt might succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Busy(_) => true,
            Self::Transport(err) => err.is_timeout(),
            _ => false,
        }
    }

    /// Check if the session must be initialized (again) before further use
    ///
    /// A lost link leaves the session `Idle`, where `initialize()` is
    /// rejected. Call `dispose()` first, then `initialize()` reopens the
    /// channel.
    pub fn requires_reinitialize(&self) -> bool {
        match self {
            Self::NotInitialized | Self::AlreadyDisposed => true,
            Self::Core(err) => err.requires_reinitialize(),
            Self::Transport(err) => err.requires_reconnect(),
            Self::Native(_) => true,
            _ => false,
        }
    }
}

/// Registry and driver lifecycle failures
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Name not present in the builtin catalogue
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// Driver descriptor violates the capability contract
    #[error("Invalid driver {name}: {reason}")]
    InvalidDriver { name: String, reason: String },

    /// Driver-level initialization failed
    #[error("Driver {name} failed to initialize: {reason}")]
    InitializationFailed { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_are_flattened() {
        let err: Error = spectro_core::Error::Busy(OperationalStatus::Receiving).into();
        assert!(matches!(err, Error::Busy(OperationalStatus::Receiving)));
        assert!(err.is_recoverable());

        let err: Error = spectro_core::Error::AlreadyDisposed.into();
        assert!(err.requires_reinitialize());

        let err: Error = spectro_core::Error::InvalidFrame("x".into()).into();
        assert!(matches!(err, Error::Core(_)));
    }

    #[test]
    fn test_transport_classification() {
        let err: Error = spectro_transport::Error::ReadTimeout.into();
        assert!(err.is_recoverable());
        assert!(!err.requires_reinitialize());

        let err: Error = spectro_transport::Error::ConnectionClosed.into();
        assert!(!err.is_recoverable());
        assert!(err.requires_reinitialize());
    }

    #[test]
    fn test_driver_error_display() {
        let err = Error::from(DriverError::UnknownDriver("acme-1".into()));
        assert_eq!(err.to_string(), "Driver error: Unknown driver: acme-1");
    }
}
