//! Operational state machine of a spectrophotometer session
//!
//! ```text
//! Unknown ──► Initializing ──► Idle ──► Sending ──► Receiving
//!    ▲             │            ▲                       │
//!    └─────────────┘            └───────────────────────┘
//!                      any ──► Disposed ──► Initializing
//! ```
//!
//! The machine only tracks state; it never talks to an instrument. At most
//! one operation can hold the machine outside `Idle`, every other caller is
//! rejected immediately instead of being queued.

use std::sync::Arc;

use spectro_types::OperationalStatus;

use crate::error::{Error, Result};

/// Session state machine
///
/// Thread-safe and can be cloned cheaply (Arc internally).
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    inner: Arc<parking_lot::RwLock<OperationalStatus>>,
}

impl StateMachine {
    /// Create a machine in `Unknown`
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> OperationalStatus {
        *self.inner.read()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == OperationalStatus::Idle
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == OperationalStatus::Disposed
    }

    /// Unknown/Disposed → Initializing
    pub fn begin_initialize(&self) -> Result<OperationalStatus> {
        let mut state = self.inner.write();

        match *state {
            OperationalStatus::Unknown | OperationalStatus::Disposed => {
                *state = OperationalStatus::Initializing;
                Ok(*state)
            }
            other => Err(Error::InvalidSessionState(format!(
                "Cannot initialize from state: {}",
                other
            ))),
        }
    }

    /// Initializing → Idle on success, back to Unknown on failure
    pub fn finish_initialize(&self, succeeded: bool) -> Result<OperationalStatus> {
        let mut state = self.inner.write();

        if *state != OperationalStatus::Initializing {
            return Err(Error::InvalidSessionState(format!(
                "Cannot finish initialization from state: {}",
                *state
            )));
        }

        *state = if succeeded {
            OperationalStatus::Idle
        } else {
            OperationalStatus::Unknown
        };
        Ok(*state)
    }

    /// Idle → Sending, failing fast from any other state
    pub fn begin_operation(&self) -> Result<OperationalStatus> {
        let mut state = self.inner.write();

        match *state {
            OperationalStatus::Idle => {
                *state = OperationalStatus::Sending;
                Ok(*state)
            }
            OperationalStatus::Disposed => Err(Error::AlreadyDisposed),
            OperationalStatus::Unknown => Err(Error::NotInitialized),
            other => Err(Error::Busy(other)),
        }
    }

    /// Sending → Receiving once the command has been written
    pub fn mark_receiving(&self) -> Result<OperationalStatus> {
        let mut state = self.inner.write();

        if *state != OperationalStatus::Sending {
            return Err(Error::InvalidSessionState(format!(
                "Cannot await a response from state: {}",
                *state
            )));
        }

        *state = OperationalStatus::Receiving;
        Ok(*state)
    }

    /// Sending/Receiving → Idle
    ///
    /// Always succeeds so that an operation can never leave the session
    /// stuck; a session disposed in the meantime stays disposed.
    pub fn finish_operation(&self) -> OperationalStatus {
        let mut state = self.inner.write();

        if matches!(
            *state,
            OperationalStatus::Sending | OperationalStatus::Receiving
        ) {
            *state = OperationalStatus::Idle;
        }
        *state
    }

    /// Any → Disposed, returning the previous state
    pub fn dispose(&self) -> OperationalStatus {
        std::mem::replace(&mut *self.inner.write(), OperationalStatus::Disposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> StateMachine {
        let machine = StateMachine::new();
        machine.begin_initialize().unwrap();
        machine.finish_initialize(true).unwrap();
        machine
    }

    #[test]
    fn test_machine_new() {
        let machine = StateMachine::new();
        assert_eq!(machine.state(), OperationalStatus::Unknown);
        assert!(!machine.is_idle());
    }

    #[test]
    fn test_initialize() {
        let machine = StateMachine::new();
        assert_eq!(machine.begin_initialize().unwrap(), OperationalStatus::Initializing);
        assert_eq!(machine.finish_initialize(true).unwrap(), OperationalStatus::Idle);
    }

    #[test]
    fn test_failed_initialize_returns_to_unknown() {
        let machine = StateMachine::new();
        machine.begin_initialize().unwrap();
        assert_eq!(machine.finish_initialize(false).unwrap(), OperationalStatus::Unknown);
        assert!(machine.begin_initialize().is_ok());
    }

    #[test]
    fn test_operation_cycle() {
        let machine = idle();

        machine.begin_operation().unwrap();
        assert_eq!(machine.state(), OperationalStatus::Sending);

        machine.mark_receiving().unwrap();
        assert_eq!(machine.state(), OperationalStatus::Receiving);

        assert_eq!(machine.finish_operation(), OperationalStatus::Idle);
    }

    #[test]
    fn test_concurrent_operation_rejected() {
        let machine = idle();
        machine.begin_operation().unwrap();

        assert!(matches!(
            machine.begin_operation(),
            Err(Error::Busy(OperationalStatus::Sending))
        ));

        machine.mark_receiving().unwrap();
        assert!(matches!(
            machine.begin_operation(),
            Err(Error::Busy(OperationalStatus::Receiving))
        ));

        // Rejection leaves the in-flight operation untouched
        assert_eq!(machine.state(), OperationalStatus::Receiving);
        machine.finish_operation();
        assert!(machine.begin_operation().is_ok());
    }

    #[test]
    fn test_operation_before_initialize() {
        let machine = StateMachine::new();
        assert!(matches!(machine.begin_operation(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_dispose_is_terminal_for_operations() {
        let machine = idle();
        assert_eq!(machine.dispose(), OperationalStatus::Idle);

        assert!(matches!(machine.begin_operation(), Err(Error::AlreadyDisposed)));
        assert_eq!(machine.finish_operation(), OperationalStatus::Disposed);

        // Re-initialization is the only way out
        assert!(machine.begin_initialize().is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        let machine = idle();
        assert!(machine.mark_receiving().is_err());
        assert!(machine.begin_initialize().is_err());
        assert!(machine.finish_initialize(true).is_err());
    }

    #[test]
    fn test_machine_clone_shares_state() {
        let machine = idle();
        let other = machine.clone();

        machine.begin_operation().unwrap();
        assert_eq!(other.state(), OperationalStatus::Sending);
    }
}
