//! Outcome classification shared by every vendor family
//!
//! A [`SpectroStatus`] holds three independent collections:
//! - messages: informational, never affect the outcome
//! - warnings: recoverable conditions, the operation still succeeded
//! - errors: the operation failed
//!
//! `is_success()` is defined as "no errors" and nothing else, so the
//! invariant `is_success() == !is_failure() == errors().is_empty()` holds for
//! every status regardless of how it was built.

use std::fmt;

/// Which collection a [`StatusMessage`] belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

/// Shared status vocabulary
///
/// Vendor decoders translate their own codes into these entries through
/// fixed lookup tables. [`StatusMessage::key`] is the stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusMessage {
    Ok,
    /// Identification text reported by the instrument
    Identity(String),
    CalibrationDone,

    WarnBattery,
    WarnLight,
    WarnCalibrationDue,
    WarnViewer,
    WarnLowSignal,
    WarnApertureMismatch,
    WarnFilterPosition,
    NotCalibrated,
    /// Numeric token that could not be parsed
    InvalidValue { wavelength: u32, token: String },
    InvalidParameter(String),
    UnknownAperture(String),
    UnknownFilter(String),
    UnknownSpecular(String),
    UnknownLensPosition(String),
    /// Unrecognized character in a fixed-column health field
    UnknownField { column: usize, value: char },

    InvalidReturn,
    UnknownString,
    UnknownStatus,
    ErrorCommand,
    ErrorParameter,
    ErrorMemory,
    ErrorBusy,
    ErrorNoData,
    ErrorCalibration,
    ErrorCalibration1,
    ErrorCalibration2,
    ErrorBlackCalibration,
    ErrorWhiteCalibration,
    ErrorLamp,
    ErrorMeasurement,
    ErrorBattery,
    ErrorCharging,
    ErrorFirmware,
    ErrorSpecularPort,
    ErrorChecksum,
    ErrorDeviceNotFound,
    Timeout,
    Communication(String),
}

impl StatusMessage {
    /// Stable identifier
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ok => "MSG_OK",
            Self::Identity(_) => "MSG_IDENTITY",
            Self::CalibrationDone => "MSG_CALIBRATION_DONE",
            Self::WarnBattery => "MSG_WARN_BATTERY",
            Self::WarnLight => "MSG_WARN_LIGHT",
            Self::WarnCalibrationDue => "MSG_WARN_CALIBRATION_DUE",
            Self::WarnViewer => "MSG_WARN_VIEWER",
            Self::WarnLowSignal => "MSG_WARN_LOW_SIGNAL",
            Self::WarnApertureMismatch => "MSG_WARN_APERTURE",
            Self::WarnFilterPosition => "MSG_WARN_FILTER",
            Self::NotCalibrated => "MSG_NOT_CALIBRATED",
            Self::InvalidValue { .. } => "MSG_INVALID_VALUE",
            Self::InvalidParameter(_) => "MSG_INVALID_PARAMETER",
            Self::UnknownAperture(_) => "MSG_UNKNOWN_APERTURE",
            Self::UnknownFilter(_) => "MSG_UNKNOWN_FILTER",
            Self::UnknownSpecular(_) => "MSG_UNKNOWN_SPECULAR",
            Self::UnknownLensPosition(_) => "MSG_UNKNOWN_LENS_POSITION",
            Self::UnknownField { .. } => "MSG_UNKNOWN_FIELD",
            Self::InvalidReturn => "MSG_INVALID_RETURN",
            Self::UnknownString => "MSG_UNKNOWN_STRING",
            Self::UnknownStatus => "MSG_UNKNOWN_STATUS",
            Self::ErrorCommand => "MSG_ERROR_COMMAND",
            Self::ErrorParameter => "MSG_ERROR_PARAMETER",
            Self::ErrorMemory => "MSG_ERROR_MEMORY",
            Self::ErrorBusy => "MSG_ERROR_BUSY",
            Self::ErrorNoData => "MSG_ERROR_NO_DATA",
            Self::ErrorCalibration => "MSG_ERROR_CALIBRATION",
            Self::ErrorCalibration1 => "MSG_ERROR_CALIBRATION1",
            Self::ErrorCalibration2 => "MSG_ERROR_CALIBRATION2",
            Self::ErrorBlackCalibration => "MSG_ERROR_BLACK_CALIBRATION",
            Self::ErrorWhiteCalibration => "MSG_ERROR_WHITE_CALIBRATION",
            Self::ErrorLamp => "MSG_ERROR_LAMP",
            Self::ErrorMeasurement => "MSG_ERROR_MEASUREMENT",
            Self::ErrorBattery => "MSG_ERROR_BATTERY",
            Self::ErrorCharging => "MSG_ERROR_CHARGING",
            Self::ErrorFirmware => "MSG_ERROR_FIRMWARE",
            Self::ErrorSpecularPort => "MSG_ERROR_SPECULAR_PORT",
            Self::ErrorChecksum => "MSG_ERROR_CHECKSUM",
            Self::ErrorDeviceNotFound => "MSG_ERROR_DEVICE_NOT_FOUND",
            Self::Timeout => "MSG_TIMEOUT",
            Self::Communication(_) => "MSG_COMMUNICATION",
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("Ok"),
            Self::Identity(text) => write!(f, "Instrument: {}", text),
            Self::CalibrationDone => f.write_str("Calibration done"),
            Self::WarnBattery => f.write_str("Battery low"),
            Self::WarnLight => f.write_str("Light source output low"),
            Self::WarnCalibrationDue => f.write_str("Calibration recommended"),
            Self::WarnViewer => f.write_str("Viewer open"),
            Self::WarnLowSignal => f.write_str("Low signal during measurement"),
            Self::WarnApertureMismatch => f.write_str("Aperture plate does not match lens"),
            Self::WarnFilterPosition => f.write_str("Filter wheel not in position"),
            Self::NotCalibrated => f.write_str("Instrument not calibrated"),
            Self::InvalidValue { wavelength, token } => {
                write!(f, "Invalid value '{}' at {}nm", token, wavelength)
            }
            Self::InvalidParameter(param) => write!(f, "Invalid parameter: {}", param),
            Self::UnknownAperture(code) => write!(f, "Unknown aperture '{}'", code),
            Self::UnknownFilter(code) => write!(f, "Unknown filter '{}'", code),
            Self::UnknownSpecular(code) => write!(f, "Unknown specular mode '{}'", code),
            Self::UnknownLensPosition(code) => write!(f, "Unknown lens position '{}'", code),
            Self::UnknownField { column, value } => {
                write!(f, "Unknown status '{}' in column {}", value, column)
            }
            Self::InvalidReturn => f.write_str("Invalid return from instrument"),
            Self::UnknownString => f.write_str("Unknown string returned"),
            Self::UnknownStatus => f.write_str("Unknown status returned"),
            Self::ErrorCommand => f.write_str("Command not understood"),
            Self::ErrorParameter => f.write_str("Parameter out of range"),
            Self::ErrorMemory => f.write_str("Memory error"),
            Self::ErrorBusy => f.write_str("Instrument busy"),
            Self::ErrorNoData => f.write_str("No data stored"),
            Self::ErrorCalibration => f.write_str("Calibration failed"),
            Self::ErrorCalibration1 => f.write_str("Zero calibration not performed"),
            Self::ErrorCalibration2 => f.write_str("White calibration not performed"),
            Self::ErrorBlackCalibration => f.write_str("Black calibration failed"),
            Self::ErrorWhiteCalibration => f.write_str("White calibration failed"),
            Self::ErrorLamp => f.write_str("Lamp failure"),
            Self::ErrorMeasurement => f.write_str("Measurement failed"),
            Self::ErrorBattery => f.write_str("Battery exhausted"),
            Self::ErrorCharging => f.write_str("Flash charging failed"),
            Self::ErrorFirmware => f.write_str("Firmware fault"),
            Self::ErrorSpecularPort => f.write_str("Specular port did not move"),
            Self::ErrorChecksum => f.write_str("Checksum mismatch"),
            Self::ErrorDeviceNotFound => f.write_str("Device not found"),
            Self::Timeout => f.write_str("Timeout waiting for instrument"),
            Self::Communication(detail) => write!(f, "Communication failure: {}", detail),
        }
    }
}

/// Result of a single instrument operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpectroStatus {
    messages: Vec<StatusMessage>,
    warnings: Vec<StatusMessage>,
    errors: Vec<StatusMessage>,
}

impl SpectroStatus {
    /// Empty status (successful, nothing to report)
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful status carrying [`StatusMessage::Ok`]
    pub fn ok() -> Self {
        Self::new().with_message(StatusMessage::Ok)
    }

    /// Failed status with exactly one error
    pub fn failure(error: StatusMessage) -> Self {
        Self::new().with_error(error)
    }

    pub fn with_message(mut self, message: StatusMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_warning(mut self, warning: StatusMessage) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn with_error(mut self, error: StatusMessage) -> Self {
        self.errors.push(error);
        self
    }

    pub fn add_message(&mut self, message: StatusMessage) {
        self.messages.push(message);
    }

    pub fn add_warning(&mut self, warning: StatusMessage) {
        self.warnings.push(warning);
    }

    pub fn add_error(&mut self, error: StatusMessage) {
        self.errors.push(error);
    }

    /// Add an entry to the collection named by `severity`
    pub fn push(&mut self, severity: Severity, entry: StatusMessage) {
        match severity {
            Severity::Message => self.messages.push(entry),
            Severity::Warning => self.warnings.push(entry),
            Severity::Error => self.errors.push(entry),
        }
    }

    /// Append every entry of `other`
    pub fn merge(&mut self, other: SpectroStatus) {
        self.messages.extend(other.messages);
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    pub fn messages(&self) -> &[StatusMessage] {
        &self.messages
    }

    pub fn warnings(&self) -> &[StatusMessage] {
        &self.warnings
    }

    pub fn errors(&self) -> &[StatusMessage] {
        &self.errors
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Check whether `entry` is present in any collection
    pub fn contains(&self, entry: &StatusMessage) -> bool {
        self.messages.contains(entry) || self.warnings.contains(entry) || self.errors.contains(entry)
    }
}

impl fmt::Display for SpectroStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "success")?;
        } else {
            write!(f, "failure")?;
        }
        for (label, entries) in [
            ("errors", &self.errors),
            ("warnings", &self.warnings),
            ("messages", &self.messages),
        ] {
            if !entries.is_empty() {
                let keys: Vec<&str> = entries.iter().map(StatusMessage::key).collect();
                write!(f, " {}={:?}", label, keys)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ok_status() {
        let status = SpectroStatus::ok();
        assert!(status.is_success());
        assert_eq!(status.messages(), &[StatusMessage::Ok]);
    }

    #[test]
    fn test_warning_does_not_fail() {
        let status = SpectroStatus::ok().with_warning(StatusMessage::WarnLight);
        assert!(status.is_success());
        assert!(status.contains(&StatusMessage::WarnLight));
    }

    #[test]
    fn test_failure_status() {
        let status = SpectroStatus::failure(StatusMessage::UnknownString);
        assert!(status.is_failure());
        assert_eq!(status.errors().len(), 1);
        assert_eq!(status.to_string(), "failure errors=[\"MSG_UNKNOWN_STRING\"]");
    }

    #[test]
    fn test_merge_keeps_errors() {
        let mut status = SpectroStatus::ok();
        status.merge(SpectroStatus::failure(StatusMessage::ErrorLamp));
        assert!(status.is_failure());
        assert_eq!(status.messages().len(), 1);
    }

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Message),
            Just(Severity::Warning),
            Just(Severity::Error),
        ]
    }

    proptest! {
        #[test]
        fn prop_success_iff_no_errors(entries in proptest::collection::vec(severity(), 0..16)) {
            let mut status = SpectroStatus::new();
            for severity in &entries {
                status.push(*severity, StatusMessage::UnknownString);
            }

            prop_assert_eq!(status.is_success(), !status.is_failure());
            prop_assert_eq!(status.is_success(), status.errors().is_empty());
            prop_assert_eq!(
                status.is_success(),
                !entries.contains(&Severity::Error)
            );
        }
    }
}
