//! Event envelope and session state

use std::fmt;

use chrono::{DateTime, Utc};

use crate::reading::SpectroReading;
use crate::settings::SpectroSettings;
use crate::status::SpectroStatus;

/// Operational state of a spectrophotometer session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OperationalStatus {
    #[default]
    Unknown,
    Initializing,
    Idle,
    Sending,
    Receiving,
    Disposed,
}

impl fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Receiving => "receiving",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Data carried by an event beside its status
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Reading(SpectroReading),
    Settings(SpectroSettings),
    /// Number of stored samples or standards
    Count(u32),
    Identity(String),
}

/// Immutable result of one instrument operation
///
/// The same envelope is returned to the caller and handed to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectroEvent {
    source: String,
    status: SpectroStatus,
    payload: EventPayload,
    timestamp: DateTime<Utc>,
}

impl SpectroEvent {
    /// Event with a status and no payload
    pub fn status(source: impl Into<String>, status: SpectroStatus) -> Self {
        Self::with_payload(source, status, EventPayload::None)
    }

    /// Event carrying a reading; the event status is the reading's status
    pub fn reading(source: impl Into<String>, reading: SpectroReading) -> Self {
        let status = reading.status().clone();
        Self::with_payload(source, status, EventPayload::Reading(reading))
    }

    pub fn with_payload(source: impl Into<String>, status: SpectroStatus, payload: EventPayload) -> Self {
        Self {
            source: source.into(),
            status,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Name of the command or session that produced the event
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn spectro_status(&self) -> &SpectroStatus {
        &self.status
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn reading_payload(&self) -> Option<&SpectroReading> {
        match &self.payload {
            EventPayload::Reading(reading) => Some(reading),
            _ => None,
        }
    }

    pub fn settings_payload(&self) -> Option<&SpectroSettings> {
        match &self.payload {
            EventPayload::Settings(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn count_payload(&self) -> Option<u32> {
        match self.payload {
            EventPayload::Count(count) => Some(count),
            _ => None,
        }
    }
}

impl fmt::Display for SpectroEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event[{}]({})", self.source, self.status)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::status::StatusMessage;

    #[test]
    fn test_reading_event_shares_status() {
        let status = SpectroStatus::ok().with_warning(StatusMessage::WarnBattery);
        let reading = SpectroReading::new(status.clone(), SpectroSettings::default(), BTreeMap::new());
        let event = SpectroEvent::reading("measure", reading);

        assert_eq!(event.spectro_status(), &status);
        assert!(event.reading_payload().is_some());
        assert!(event.settings_payload().is_none());
    }

    #[test]
    fn test_status_event() {
        let event = SpectroEvent::status("calibrate", SpectroStatus::failure(StatusMessage::ErrorLamp));
        assert!(event.is_failure());
        assert_eq!(event.payload(), &EventPayload::None);
        assert_eq!(event.source(), "calibrate");
    }
}
