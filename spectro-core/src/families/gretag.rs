//! Single-character command family (GretagMacbeth SPM)
//!
//! Every command is exactly one ASCII character with no terminator. Replies
//! end with CR.
//!
//! Status reply layout:
//!
//! ```text
//! byte 0   calibration marker   'X'/'x' = not calibrated
//! byte 1   reserved
//! byte 2   specular             'I' included, 'E' excluded
//! byte 3   UV filter            'I' in (UV cut 400), 'O' out
//! byte 4   lens position        'S' small area, 'L' large area
//! ```
//!
//! Measurement reply: `M` followed by 36 space-separated reflectances
//! (0..1) from 380 nm to 730 nm in 10 nm steps.

use bytes::Bytes;
use spectro_types::{
    Aperture, CalibrationStep, EventPayload, LensPosition, LightFilter, SpectroEvent,
    SpectroReading, SpectroSettings, SpectroStatus, Specular, StatusMessage, WavelengthRange,
};
use tracing::debug;

use crate::command::{CommandSet, Operation, SpectroCommand};
use crate::error::{Error, Result};
use crate::token;

pub const FAMILY: &str = "gretag";

pub const CALIBRATE: &[u8] = b"c";
pub const STATUS: &[u8] = b"s";
pub const MEASURE: &[u8] = b"m";
pub const IDENTIFY: &[u8] = b"i";

/// Sampled wavelengths of a measurement
pub const WAVELENGTHS: WavelengthRange = WavelengthRange::fixed(380, 730, 10);

/// Number of values in a measurement reply
pub const MEASURE_TOKENS: usize = 36;

const MEASUREMENT_MARKER: &str = "M";

fn is_not_calibrated(marker: u8) -> bool {
    matches!(marker, b'X' | b'x')
}

/// Decode a status reply
///
/// Returns the settings only when no field produced an error. A reply
/// shorter than five bytes yields exactly one [`StatusMessage::UnknownStatus`].
pub fn decode_status(text: &str) -> (SpectroStatus, Option<SpectroSettings>) {
    let bytes = text.as_bytes();
    let fields = (|| Some((*bytes.first()?, *bytes.get(2)?, *bytes.get(3)?, *bytes.get(4)?)))();

    let Some((calibration, specular, filter, lens)) = fields else {
        return (SpectroStatus::failure(StatusMessage::UnknownStatus), None);
    };

    let mut status = SpectroStatus::new();

    if is_not_calibrated(calibration) {
        status.add_warning(StatusMessage::NotCalibrated);
    }

    let specular = match specular {
        b'I' => Some(Specular::Included),
        b'E' => Some(Specular::Excluded),
        other => {
            status.add_error(StatusMessage::UnknownSpecular((other as char).to_string()));
            None
        }
    };

    let filter = match filter {
        b'I' => LightFilter::UvCut400,
        b'O' => LightFilter::NoFilter,
        other => {
            status.add_warning(StatusMessage::UnknownFilter((other as char).to_string()));
            LightFilter::NoFilter
        }
    };

    let lens = match lens {
        b'S' => Some(LensPosition::SmallArea),
        b'L' => Some(LensPosition::LargeArea),
        other => {
            status.add_error(StatusMessage::UnknownLensPosition((other as char).to_string()));
            None
        }
    };

    let settings = match (specular, lens) {
        (Some(specular), Some(lens)) if status.is_success() => {
            let aperture = match lens {
                LensPosition::SmallArea => Aperture::Small,
                _ => Aperture::Large,
            };
            Some(
                SpectroSettings::new()
                    .with_specular(specular)
                    .with_light_filter(filter)
                    .with_lens_position(lens)
                    .with_aperture(aperture),
            )
        }
        _ => None,
    };

    (status, settings)
}

/// `c`: white calibration
#[derive(Debug, Clone, Default)]
pub struct CalibrateCommand;

impl SpectroCommand for CalibrateCommand {
    fn name(&self) -> &'static str {
        "gretag.calibrate"
    }

    fn construct(&self) -> Bytes {
        Bytes::from_static(CALIBRATE)
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);

        let status = match text.as_bytes().first() {
            None => SpectroStatus::failure(StatusMessage::UnknownStatus),
            Some(marker) if is_not_calibrated(*marker) => {
                SpectroStatus::failure(StatusMessage::ErrorCalibration)
            }
            Some(_) => SpectroStatus::ok().with_message(StatusMessage::CalibrationDone),
        };

        SpectroEvent::status(self.name(), status)
    }
}

/// `s`: status query
#[derive(Debug, Clone, Default)]
pub struct StatusCommand;

impl SpectroCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "gretag.status"
    }

    fn construct(&self) -> Bytes {
        Bytes::from_static(STATUS)
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);
        let (status, settings) = decode_status(&text);

        match settings {
            Some(settings) => {
                SpectroEvent::with_payload(self.name(), status, EventPayload::Settings(settings))
            }
            None => SpectroEvent::status(self.name(), status),
        }
    }
}

/// `m`: measurement
#[derive(Debug, Clone)]
pub struct MeasureCommand {
    settings: SpectroSettings,
}

impl MeasureCommand {
    pub fn new(settings: SpectroSettings) -> Self {
        Self { settings }
    }
}

impl SpectroCommand for MeasureCommand {
    fn name(&self) -> &'static str {
        "gretag.measure"
    }

    fn construct(&self) -> Bytes {
        Bytes::from_static(MEASURE)
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);
        let mut tokens = text.split_whitespace();

        let status = match tokens.next() {
            Some(MEASUREMENT_MARKER) => {
                let values: Vec<&str> = tokens.collect();
                if values.len() != MEASURE_TOKENS {
                    debug!(
                        expected = MEASURE_TOKENS,
                        actual = values.len(),
                        "Unexpected measurement token count"
                    );
                    SpectroStatus::failure(StatusMessage::InvalidReturn)
                } else {
                    let mut status = SpectroStatus::ok();
                    let values = token::parse_samples(
                        values,
                        WAVELENGTHS.start_nm(),
                        WAVELENGTHS.interval_nm(),
                        1.0,
                        &mut status,
                    );
                    let reading = SpectroReading::new(status, self.settings.clone(), values);
                    return SpectroEvent::reading(self.name(), reading);
                }
            }
            Some("X") | Some("x") => SpectroStatus::failure(StatusMessage::NotCalibrated),
            Some(_) => SpectroStatus::failure(StatusMessage::UnknownString),
            None => SpectroStatus::failure(StatusMessage::InvalidReturn),
        };

        SpectroEvent::status(self.name(), status)
    }
}

/// `i`: identification
#[derive(Debug, Clone, Default)]
pub struct IdentifyCommand;

impl SpectroCommand for IdentifyCommand {
    fn name(&self) -> &'static str {
        "gretag.identify"
    }

    fn construct(&self) -> Bytes {
        Bytes::from_static(IDENTIFY)
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);

        if text.is_empty() {
            return SpectroEvent::status(
                self.name(),
                SpectroStatus::failure(StatusMessage::InvalidReturn),
            );
        }

        let status = SpectroStatus::ok().with_message(StatusMessage::Identity(text.clone()));
        SpectroEvent::with_payload(self.name(), status, EventPayload::Identity(text))
    }
}

/// Command set of the single-character family
#[derive(Debug, Clone, Default)]
pub struct GretagCommands;

impl CommandSet for GretagCommands {
    fn family(&self) -> &'static str {
        FAMILY
    }

    fn command(
        &self,
        operation: Operation,
        settings: &SpectroSettings,
    ) -> Result<Box<dyn SpectroCommand>> {
        match operation {
            Operation::Measure => Ok(Box::new(MeasureCommand::new(settings.clone()))),
            Operation::Calibrate(CalibrationStep::White) => Ok(Box::new(CalibrateCommand)),
            Operation::QueryStatus => Ok(Box::new(StatusCommand)),
            Operation::Identify => Ok(Box::new(IdentifyCommand)),
            other => Err(Error::not_supported(FAMILY, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn measurement(values: &[&str]) -> Vec<u8> {
        format!("M {}\r", values.join(" ")).into_bytes()
    }

    #[test]
    fn test_single_character_commands() {
        assert_eq!(CalibrateCommand.construct().as_ref(), b"c");
        assert_eq!(StatusCommand.construct().as_ref(), b"s");
        assert_eq!(MeasureCommand::new(SpectroSettings::default()).construct().as_ref(), b"m");
    }

    #[test]
    fn test_status_decodes_settings() {
        let event = StatusCommand.interpret(b"C0EIS\r");

        assert!(event.is_success());
        let settings = event.settings_payload().unwrap();
        assert_eq!(settings.specular(), Specular::Excluded);
        assert_eq!(settings.light_filter(), LightFilter::UvCut400);
        assert_eq!(settings.lens_position(), Some(LensPosition::SmallArea));
        assert_eq!(settings.aperture(), Some(Aperture::Small));
    }

    #[test]
    fn test_status_not_calibrated_is_warning() {
        let (status, settings) = decode_status("x0IOL");
        assert!(status.is_success());
        assert_eq!(status.warnings(), &[StatusMessage::NotCalibrated]);
        assert_eq!(settings.unwrap().light_filter(), LightFilter::NoFilter);
    }

    #[test]
    fn test_unknown_filter_falls_back() {
        let (status, settings) = decode_status("C0I?L");
        assert!(status.is_success());
        assert_eq!(status.warnings(), &[StatusMessage::UnknownFilter("?".into())]);
        assert_eq!(settings.unwrap().light_filter(), LightFilter::NoFilter);
    }

    #[test]
    fn test_unknown_specular_and_lens_are_errors() {
        let (status, settings) = decode_status("C0QOZ");
        assert!(status.is_failure());
        assert_eq!(status.errors().len(), 2);
        assert!(settings.is_none());
    }

    #[test]
    fn test_status_reply_with_blank_first_column() {
        let event = StatusCommand.interpret(b" 0IOL\r");
        assert!(event.is_success(), "{}", event);
        assert!(event.spectro_status().warnings().is_empty());

        let settings = event.settings_payload().unwrap();
        assert_eq!(settings.light_filter(), LightFilter::NoFilter);
        assert_eq!(settings.lens_position(), Some(LensPosition::LargeArea));
    }

    #[test]
    fn test_short_status_is_one_error() {
        for reply in ["", "C", "C0IO"] {
            let (status, settings) = decode_status(reply);
            assert_eq!(status.errors(), &[StatusMessage::UnknownStatus]);
            assert!(status.warnings().is_empty());
            assert!(settings.is_none());
        }
    }

    #[test]
    fn test_calibration_reply() {
        assert!(CalibrateCommand.interpret(b"C\r").is_success());

        let failed = CalibrateCommand.interpret(b"X\r");
        assert_eq!(failed.spectro_status().errors(), &[StatusMessage::ErrorCalibration]);
    }

    #[test]
    fn test_measurement_values() {
        let values: Vec<String> = (0..MEASURE_TOKENS).map(|i| format!("0.{:02}", i + 10)).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();

        let event = MeasureCommand::new(SpectroSettings::default()).interpret(&measurement(&refs));

        let reading = event.reading_payload().unwrap();
        assert_eq!(reading.len(), MEASURE_TOKENS);
        assert_eq!(reading.value_at(380), Some(0.10));
        assert_eq!(reading.value_at(730), Some(0.45));
    }

    #[test]
    fn test_measurement_token_gate() {
        let event = MeasureCommand::new(SpectroSettings::default()).interpret(&measurement(&["0.5"; 35]));

        assert_eq!(event.spectro_status().errors(), &[StatusMessage::InvalidReturn]);
        assert!(event.reading_payload().is_none());
    }

    #[test]
    fn test_measurement_refused() {
        let command = MeasureCommand::new(SpectroSettings::default());
        assert_eq!(
            command.interpret(b"X\r").spectro_status().errors(),
            &[StatusMessage::NotCalibrated]
        );
        assert_eq!(
            command.interpret(b"?? 1 2\r").spectro_status().errors(),
            &[StatusMessage::UnknownString]
        );
    }

    #[test]
    fn test_identify() {
        let event = IdentifyCommand.interpret(b"SPM 100 V2.13\r");
        assert_eq!(event.payload(), &EventPayload::Identity("SPM 100 V2.13".into()));
        assert!(IdentifyCommand.interpret(b"\r").is_failure());
    }

    #[test]
    fn test_command_set() {
        let commands = GretagCommands;
        assert!(commands.supports(Operation::Measure));
        assert!(commands.supports(Operation::Calibrate(CalibrationStep::White)));
        assert!(!commands.supports(Operation::Calibrate(CalibrationStep::Black)));
        assert!(!commands.supports(Operation::ApplySettings));
        assert!(!commands.supports(Operation::QueryStoredSamples));
    }
}
