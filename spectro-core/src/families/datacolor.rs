//! Fixed-column family (Datacolor 600 class benchtop instruments)
//!
//! Single-letter commands terminated by CR. The instrument reports its
//! health and optical configuration as an 11-character status string where
//! every column has a fixed meaning:
//!
//! ```text
//! column  0 calibration   0 ok, 1 due (warning), 2 failed (error)
//! column  1 firmware      0 ok, 1 error
//! column  2 viewer        0 ok, 1 open (warning)
//! column  3 measurement   0 ok, 1 error, 2 low signal (warning)
//! column  4 specular port 0 ok, 1 error
//! column  5 aperture      0 ok, 1 plate mismatch (warning)
//! column  6 filter        0 ok, 1 out of position (warning)
//! column  7 specular      I / E
//! column  8 aperture      L / M / S / U
//! column  9 lens          L / M / S / U
//! column 10 UV filter     0 none, 1 400nm, 2 420nm, 3 460nm
//! ```
//!
//! A measurement reply is the status string, a comma and 35 integer values
//! in hundredths of a percent from 360nm to 700nm.

use bytes::Bytes;
use spectro_types::{
    Aperture, CalibrationStep, EventPayload, LensPosition, LightFilter, Severity, SpectroEvent,
    SpectroReading, SpectroSettings, SpectroStatus, Specular, StatusMessage, WavelengthRange,
};
use tracing::debug;

use crate::command::{CommandSet, Operation, SpectroCommand};
use crate::error::{Error, Result};
use crate::token;

pub const FAMILY: &str = "datacolor";

pub const STATUS_LENGTH: usize = 11;

pub const WAVELENGTHS: WavelengthRange = WavelengthRange::fixed(360, 700, 10);

pub const MEASURE_TOKENS: usize = 35;

/// Raw values are hundredths of a percent
pub const VALUE_DIVISOR: f64 = 10_000.0;

/// Health columns: `(column, character) -> entry`
fn health(column: usize, value: char) -> Option<(Severity, StatusMessage)> {
    let entry = match (column, value) {
        (_, '0') => return None,
        (0, '1') => (Severity::Warning, StatusMessage::WarnCalibrationDue),
        (0, '2') => (Severity::Error, StatusMessage::ErrorCalibration),
        (1, '1') => (Severity::Error, StatusMessage::ErrorFirmware),
        (2, '1') => (Severity::Warning, StatusMessage::WarnViewer),
        (3, '1') => (Severity::Error, StatusMessage::ErrorMeasurement),
        (3, '2') => (Severity::Warning, StatusMessage::WarnLowSignal),
        (4, '1') => (Severity::Error, StatusMessage::ErrorSpecularPort),
        (5, '1') => (Severity::Warning, StatusMessage::WarnApertureMismatch),
        (6, '1') => (Severity::Warning, StatusMessage::WarnFilterPosition),
        (column, value) => (Severity::Warning, StatusMessage::UnknownField { column, value }),
    };
    Some(entry)
}

fn aperture_from(code: char) -> Option<Aperture> {
    match code {
        'L' => Some(Aperture::Large),
        'M' => Some(Aperture::Medium),
        'S' => Some(Aperture::Small),
        'U' => Some(Aperture::UltraSmall),
        _ => None,
    }
}

fn lens_from(code: char) -> Option<LensPosition> {
    match code {
        'L' => Some(LensPosition::LargeArea),
        'M' => Some(LensPosition::MediumArea),
        'S' => Some(LensPosition::SmallArea),
        'U' => Some(LensPosition::UltraSmallArea),
        _ => None,
    }
}

fn filter_from(code: char) -> Option<LightFilter> {
    match code {
        '0' => Some(LightFilter::NoFilter),
        '1' => Some(LightFilter::UvCut400),
        '2' => Some(LightFilter::UvCut420),
        '3' => Some(LightFilter::UvCut460),
        _ => None,
    }
}

/// Decode an 11-column status string
///
/// Returns the status and, when it holds no error, the instrument's
/// settings. Text shorter than 11 characters yields exactly one
/// [`StatusMessage::UnknownStatus`] error.
///
/// # Examples
///
/// ```
/// use spectro_core::families::datacolor::decode_status;
/// use spectro_types::{Aperture, StatusMessage};
///
/// let (status, settings) = decode_status("0000000IML0");
/// assert!(status.is_success());
/// assert_eq!(settings.unwrap().aperture(), Some(Aperture::Medium));
///
/// let (status, _) = decode_status("000");
/// assert_eq!(status.errors(), &[StatusMessage::UnknownStatus]);
/// ```
pub fn decode_status(text: &str) -> (SpectroStatus, Option<SpectroSettings>) {
    let columns: Vec<char> = text.chars().take(STATUS_LENGTH).collect();
    let columns: [char; STATUS_LENGTH] = match columns.try_into() {
        Ok(columns) => columns,
        Err(_) => return (SpectroStatus::failure(StatusMessage::UnknownStatus), None),
    };

    let mut status = SpectroStatus::new();
    for (column, value) in columns.iter().take(7).enumerate() {
        if let Some((severity, message)) = health(column, *value) {
            status.push(severity, message);
        }
    }

    let mut settings = SpectroSettings::new();

    match columns[7] {
        'I' => settings = settings.with_specular(Specular::Included),
        'E' => settings = settings.with_specular(Specular::Excluded),
        other => status.add_error(StatusMessage::UnknownSpecular(other.to_string())),
    }

    let aperture = aperture_from(columns[8]).unwrap_or_else(|| {
        status.add_warning(StatusMessage::UnknownAperture(columns[8].to_string()));
        Aperture::Large
    });
    settings = settings.with_aperture(aperture);

    match lens_from(columns[9]) {
        Some(lens) => settings = settings.with_lens_position(lens),
        None => status.add_error(StatusMessage::UnknownLensPosition(columns[9].to_string())),
    }

    let filter = filter_from(columns[10]).unwrap_or_else(|| {
        status.add_warning(StatusMessage::UnknownFilter(columns[10].to_string()));
        LightFilter::NoFilter
    });
    settings = settings.with_light_filter(filter);

    if status.is_success() {
        (status, Some(settings))
    } else {
        (status, None)
    }
}

/// Encode the four settings characters of the `P` command
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] when the filter has no code on this
/// family.
pub fn encode_settings(settings: &SpectroSettings) -> Result<String> {
    let specular = match settings.specular() {
        Specular::Included => 'I',
        Specular::Excluded => 'E',
    };

    let aperture = settings.aperture().unwrap_or(Aperture::Large);
    let lens = settings.lens_position().unwrap_or_else(|| aperture.paired_lens());

    let aperture = match aperture {
        Aperture::Large => 'L',
        Aperture::Medium => 'M',
        Aperture::Small => 'S',
        Aperture::UltraSmall => 'U',
    };

    let lens = match lens {
        LensPosition::LargeArea => 'L',
        LensPosition::MediumArea => 'M',
        LensPosition::SmallArea => 'S',
        LensPosition::UltraSmallArea => 'U',
    };

    let filter = match settings.light_filter() {
        LightFilter::NoFilter => '0',
        LightFilter::UvCut400 => '1',
        LightFilter::UvCut420 => '2',
        LightFilter::UvCut460 => '3',
        other => {
            return Err(Error::InvalidParameter(format!(
                "filter {} not available on {}",
                other, FAMILY
            )))
        }
    };

    Ok([specular, aperture, lens, filter].iter().collect())
}

fn command_bytes(body: &str) -> Bytes {
    Bytes::from(format!("{}\r", body))
}

/// `S`: read the status string
#[derive(Debug, Clone, Default)]
pub struct StatusCommand;

impl SpectroCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "datacolor.status"
    }

    fn construct(&self) -> Bytes {
        command_bytes("S")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (status, settings) = decode_status(&token::response_text(response));

        match settings {
            Some(settings) => {
                SpectroEvent::with_payload(self.name(), status, EventPayload::Settings(settings))
            }
            None => SpectroEvent::status(self.name(), status),
        }
    }
}

/// `P<spec><ap><lens><filter>`: apply settings, answered by a status string
#[derive(Debug, Clone)]
pub struct SettingsCommand {
    encoded: String,
}

impl SettingsCommand {
    pub fn new(settings: &SpectroSettings) -> Result<Self> {
        Ok(Self {
            encoded: encode_settings(settings)?,
        })
    }
}

impl SpectroCommand for SettingsCommand {
    fn name(&self) -> &'static str {
        "datacolor.settings"
    }

    fn construct(&self) -> Bytes {
        command_bytes(&format!("P{}", self.encoded))
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        StatusCommand.interpret(response)
    }
}

/// `M`: measurement
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
        "datacolor.measure"
    }

    fn construct(&self) -> Bytes {
        command_bytes("M")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);
        let fields = token::fields(&text, ',');

        let Some((_, values)) = fields.split_first() else {
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        };

        // Status columns are positional, blanks included
        let head = text.split(',').next().unwrap_or_default();
        let (mut status, reported) = decode_status(head);
        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        if values.len() != MEASURE_TOKENS {
            debug!(
                expected = MEASURE_TOKENS,
                actual = values.len(),
                "Unexpected measurement token count"
            );
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        let values = token::parse_samples(
            values.iter().copied(),
            WAVELENGTHS.start_nm(),
            WAVELENGTHS.interval_nm(),
            VALUE_DIVISOR,
            &mut status,
        );

        // The status string reports the optics actually in use
        let mut settings = reported.unwrap_or_else(|| self.settings.clone());
        if let Some(location) = self.settings.location() {
            settings = settings.with_location(location);
        }

        SpectroEvent::reading(self.name(), SpectroReading::new(status, settings, values))
    }
}

/// `B` / `W` / `G`: calibration, answered by a status string
#[derive(Debug, Clone)]
pub struct CalibrateCommand {
    step: CalibrationStep,
}

impl CalibrateCommand {
    pub fn new(step: CalibrationStep) -> Self {
        Self { step }
    }
}

impl SpectroCommand for CalibrateCommand {
    fn name(&self) -> &'static str {
        "datacolor.calibrate"
    }

    fn construct(&self) -> Bytes {
        match self.step {
            CalibrationStep::Black => command_bytes("B"),
            CalibrationStep::White => command_bytes("W"),
            CalibrationStep::Green => command_bytes("G"),
        }
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, _) = decode_status(&token::response_text(response));
        if status.is_success() {
            status.add_message(StatusMessage::CalibrationDone);
        }
        SpectroEvent::status(self.name(), status)
    }
}

/// `I`: free-text identification
#[derive(Debug, Clone, Default)]
pub struct IdentifyCommand;

impl SpectroCommand for IdentifyCommand {
    fn name(&self) -> &'static str {
        "datacolor.identify"
    }

    fn construct(&self) -> Bytes {
        command_bytes("I")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);

        if text.is_empty() {
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        let status = SpectroStatus::ok().with_message(StatusMessage::Identity(text.clone()));
        SpectroEvent::with_payload(self.name(), status, EventPayload::Identity(text))
    }
}

/// Command set of the fixed-column family
#[derive(Debug, Clone, Default)]
pub struct DatacolorCommands;

impl CommandSet for DatacolorCommands {
    fn family(&self) -> &'static str {
        FAMILY
    }

    fn command(
        &self,
        operation: Operation,
        settings: &SpectroSettings,
    ) -> Result<Box<dyn SpectroCommand>> {
        let command: Box<dyn SpectroCommand> = match operation {
            Operation::Measure => Box::new(MeasureCommand::new(settings.clone())),
            Operation::Calibrate(step) => Box::new(CalibrateCommand::new(step)),
            Operation::QueryStatus => Box::new(StatusCommand),
            Operation::ApplySettings => Box::new(SettingsCommand::new(settings)?),
            Operation::Identify => Box::new(IdentifyCommand),
            other => return Err(Error::not_supported(FAMILY, other)),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn measurement(status: &str, count: usize) -> Vec<u8> {
        let mut reply = status.to_string();
        for i in 0..count {
            reply.push_str(&format!(",{}", 1000 + i * 100));
        }
        reply.push('\r');
        reply.into_bytes()
    }

    #[test]
    fn test_clean_status() {
        let (status, settings) = decode_status("0000000ESS2");
        assert!(status.is_success());
        assert!(status.warnings().is_empty());

        let settings = settings.unwrap();
        assert_eq!(settings.specular(), Specular::Excluded);
        assert_eq!(settings.aperture(), Some(Aperture::Small));
        assert_eq!(settings.lens_position(), Some(LensPosition::SmallArea));
        assert_eq!(settings.light_filter(), LightFilter::UvCut420);
    }

    #[test]
    fn test_status_reply_keeps_blank_columns() {
        let event = StatusCommand.interpret(b" 000000IML0\r");
        assert!(event.is_success(), "{}", event);
        assert_eq!(
            event.spectro_status().warnings(),
            &[StatusMessage::UnknownField { column: 0, value: ' ' }]
        );
        assert_eq!(event.settings_payload().unwrap().aperture(), Some(Aperture::Medium));

        let event = StatusCommand.interpret(b"0000000IML \r");
        assert_eq!(
            event.spectro_status().warnings(),
            &[StatusMessage::UnknownFilter(" ".into())]
        );
        assert_eq!(event.settings_payload().unwrap().light_filter(), LightFilter::NoFilter);
    }

    #[test]
    fn test_health_columns() {
        let (status, _) = decode_status("1010000IMM0");
        assert!(status.is_success());
        assert_eq!(
            status.warnings(),
            &[StatusMessage::WarnCalibrationDue, StatusMessage::WarnViewer]
        );
        assert!(status.errors().is_empty());

        let (status, settings) = decode_status("2101100ILL0");
        assert!(status.is_failure());
        assert_eq!(
            status.errors(),
            &[
                StatusMessage::ErrorCalibration,
                StatusMessage::ErrorFirmware,
                StatusMessage::ErrorMeasurement,
                StatusMessage::ErrorSpecularPort,
            ]
        );
        assert!(settings.is_none());
    }

    #[test]
    fn test_low_signal_is_warning() {
        let (status, _) = decode_status("0002011IMM0");
        assert!(status.is_success());
        assert_eq!(
            status.warnings(),
            &[
                StatusMessage::WarnLowSignal,
                StatusMessage::WarnApertureMismatch,
                StatusMessage::WarnFilterPosition,
            ]
        );
    }

    #[test]
    fn test_unknown_health_character() {
        let (status, _) = decode_status("0900000ILL0");
        assert!(status.is_success());
        assert_eq!(status.warnings(), &[StatusMessage::UnknownField { column: 1, value: '9' }]);
    }

    #[test]
    fn test_settings_fallbacks() {
        let (status, settings) = decode_status("0000000IXL7");
        assert!(status.is_success());
        assert_eq!(status.warnings().len(), 2);

        let settings = settings.unwrap();
        assert_eq!(settings.aperture(), Some(Aperture::Large));
        assert_eq!(settings.light_filter(), LightFilter::NoFilter);
    }

    #[test]
    fn test_settings_hard_errors() {
        let (status, settings) = decode_status("0000000QLQ0");
        assert_eq!(
            status.errors(),
            &[
                StatusMessage::UnknownSpecular("Q".into()),
                StatusMessage::UnknownLensPosition("Q".into())
            ]
        );
        assert!(settings.is_none());
    }

    #[test]
    fn test_short_status() {
        for text in ["", "0", "0000000ILL"] {
            let (status, settings) = decode_status(text);
            assert_eq!(status.errors(), &[StatusMessage::UnknownStatus]);
            assert!(status.warnings().is_empty());
            assert!(settings.is_none());
        }
    }

    #[test]
    fn test_settings_command() {
        let settings = SpectroSettings::new()
            .with_specular(Specular::Excluded)
            .with_aperture(Aperture::UltraSmall)
            .with_light_filter(LightFilter::UvCut460);
        let command = SettingsCommand::new(&settings).unwrap();
        assert_eq!(command.construct().as_ref(), b"PEUU3\r");

        let settings = SpectroSettings::new().with_light_filter(LightFilter::UvAdjusted);
        assert!(SettingsCommand::new(&settings).is_err());
    }

    #[test]
    fn test_settings_read_back() {
        let settings = SpectroSettings::new()
            .with_specular(Specular::Excluded)
            .with_aperture(Aperture::Medium)
            .with_lens_position(LensPosition::MediumArea)
            .with_light_filter(LightFilter::UvCut400);
        let encoded = encode_settings(&settings).unwrap();

        let (status, decoded) = decode_status(&format!("0000000{}", encoded));
        assert!(status.is_success());
        assert_eq!(decoded, Some(settings));
    }

    #[test]
    fn test_measurement() {
        let event = MeasureCommand::new(SpectroSettings::new().with_location("A1"))
            .interpret(&measurement("0000000IMM0", 35));
        let reading = event.reading_payload().unwrap();

        assert_eq!(reading.len(), 35);
        assert_eq!(reading.span(), Some((360, 700)));
        assert_eq!(reading.value_at(360), Some(0.1));
        assert_eq!(reading.settings().aperture(), Some(Aperture::Medium));
        assert_eq!(reading.settings().location(), Some("A1"));
    }

    #[test]
    fn test_measurement_token_gate() {
        let event = MeasureCommand::new(SpectroSettings::default()).interpret(&measurement("0000000IMM0", 34));
        assert_eq!(event.spectro_status().errors(), &[StatusMessage::InvalidReturn]);
    }

    #[test]
    fn test_measurement_failed_status() {
        let event = MeasureCommand::new(SpectroSettings::default()).interpret(&measurement("0001000IMM0", 35));
        assert_eq!(event.spectro_status().errors(), &[StatusMessage::ErrorMeasurement]);
        assert!(event.reading_payload().is_none());
    }

    #[test]
    fn test_calibration_commands() {
        assert_eq!(CalibrateCommand::new(CalibrationStep::Black).construct().as_ref(), b"B\r");
        assert_eq!(CalibrateCommand::new(CalibrationStep::White).construct().as_ref(), b"W\r");
        assert_eq!(CalibrateCommand::new(CalibrationStep::Green).construct().as_ref(), b"G\r");

        let event = CalibrateCommand::new(CalibrationStep::White).interpret(b"0000000ILL0\r");
        assert!(event.spectro_status().contains(&StatusMessage::CalibrationDone));

        let event = CalibrateCommand::new(CalibrationStep::White).interpret(b"2000000ILL0\r");
        assert_eq!(event.spectro_status().errors(), &[StatusMessage::ErrorCalibration]);
    }

    #[test]
    fn test_offline_not_supported() {
        assert!(!DatacolorCommands.supports(Operation::QueryStoredSamples));
        assert!(DatacolorCommands.supports(Operation::Calibrate(CalibrationStep::Green)));
    }
}
