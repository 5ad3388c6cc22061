//! Multi-line structured family (X-Rite Ci7 class instruments)
//!
//! Commands are a letter, optional arguments and the `R ` terminator.
//! Replies are LF-delimited lines. The first line of every non-error reply
//! is the fixed-width status line:
//!
//! ```text
//! col 0     specular  I / E
//! col 1     aperture  L / M / S / U
//! col 2     lens      L / M / S / U
//! col 3..6  UV filter 000 / 400 / 420 / 460
//! ```
//!
//! A measurement reply carries eight more lines of five comma-separated
//! percent values: 40 values from 360nm to 750nm. Errors are reported as a
//! single `ERR nn` line.

use bytes::Bytes;
use spectro_types::{
    Aperture, CalibrationStep, EventPayload, LensPosition, LightFilter, SpectroEvent,
    SpectroReading, SpectroSettings, SpectroStatus, Specular, StatusMessage, WavelengthRange,
};
use tracing::{debug, warn};

use crate::command::{CommandSet, Operation, SpectroCommand};
use crate::constants::{parameters, LF};
use crate::error::{Error, Result};
use crate::token;

pub const FAMILY: &str = "xrite";

pub const TERMINATOR: &str = "R ";

pub const WAVELENGTHS: WavelengthRange = WavelengthRange::fixed(360, 750, 10);

/// Lines in a measurement reply, status line included
pub const MEASURE_LINES: usize = 9;

/// Values on each data line of a measurement reply
pub const VALUES_PER_LINE: usize = 5;

pub const VALUE_DIVISOR: f64 = 100.0;

/// Minimum length of the status line
pub const STATUS_LINE_LENGTH: usize = 6;

/// Highest number of readings averaged per calibration step
pub const MAX_CALIBRATION_READINGS: u32 = 99;

const ERROR_PREFIX: &str = "ERR";

/// Map an `ERR nn` code onto a status error
fn error_code(code: &str) -> StatusMessage {
    match code {
        "01" => StatusMessage::ErrorBlackCalibration,
        "02" => StatusMessage::ErrorWhiteCalibration,
        "03" => StatusMessage::NotCalibrated,
        "10" => StatusMessage::ErrorLamp,
        "11" => StatusMessage::ErrorMeasurement,
        "20" => StatusMessage::ErrorCommand,
        "21" => StatusMessage::ErrorParameter,
        _ => StatusMessage::UnknownString,
    }
}

/// Decode an `ERR nn` line, `None` when the line is not an error report
pub fn decode_error(line: &str) -> Option<SpectroStatus> {
    let code = line.strip_prefix(ERROR_PREFIX)?.trim();
    Some(SpectroStatus::failure(error_code(code)))
}

/// Decode the status line into settings
///
/// # Examples
///
/// ```
/// use spectro_core::families::xrite::decode_status_line;
/// use spectro_types::{LightFilter, Specular};
///
/// let (status, settings) = decode_status_line("ELL400");
/// assert!(status.is_success());
/// let settings = settings.unwrap();
/// assert_eq!(settings.specular(), Specular::Excluded);
/// assert_eq!(settings.light_filter(), LightFilter::UvCut400);
/// ```
pub fn decode_status_line(line: &str) -> (SpectroStatus, Option<SpectroSettings>) {
    if let Some(status) = decode_error(line) {
        return (status, None);
    }

    let Some(columns) = line.get(..STATUS_LINE_LENGTH) else {
        return (SpectroStatus::failure(StatusMessage::UnknownStatus), None);
    };
    let bytes = columns.as_bytes();

    let mut status = SpectroStatus::ok();
    let mut settings = SpectroSettings::new();

    match bytes[0] {
        b'I' => settings = settings.with_specular(Specular::Included),
        b'E' => settings = settings.with_specular(Specular::Excluded),
        other => status.add_error(StatusMessage::UnknownSpecular(char::from(other).to_string())),
    }

    match bytes[1] {
        b'L' => settings = settings.with_aperture(Aperture::Large),
        b'M' => settings = settings.with_aperture(Aperture::Medium),
        b'S' => settings = settings.with_aperture(Aperture::Small),
        b'U' => settings = settings.with_aperture(Aperture::UltraSmall),
        other => {
            status.add_warning(StatusMessage::UnknownAperture(char::from(other).to_string()));
            settings = settings.with_aperture(Aperture::Large);
        }
    }

    match bytes[2] {
        b'L' => settings = settings.with_lens_position(LensPosition::LargeArea),
        b'M' => settings = settings.with_lens_position(LensPosition::MediumArea),
        b'S' => settings = settings.with_lens_position(LensPosition::SmallArea),
        b'U' => settings = settings.with_lens_position(LensPosition::UltraSmallArea),
        other => status.add_error(StatusMessage::UnknownLensPosition(char::from(other).to_string())),
    }

    let filter = match columns.get(3..6).unwrap_or_default() {
        "000" => LightFilter::NoFilter,
        "400" => LightFilter::UvCut400,
        "420" => LightFilter::UvCut420,
        "460" => LightFilter::UvCut460,
        other => {
            status.add_warning(StatusMessage::UnknownFilter(other.to_string()));
            LightFilter::NoFilter
        }
    };
    settings = settings.with_light_filter(filter);

    if status.is_success() {
        (status, Some(settings))
    } else {
        (status, None)
    }
}

/// Encode the six status-line characters written by `P`
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for the UV-adjusted filter, which has
/// no code on this family.
pub fn encode_settings(settings: &SpectroSettings) -> Result<String> {
    let aperture = settings.aperture().unwrap_or(Aperture::Large);
    let lens = settings.lens_position().unwrap_or_else(|| aperture.paired_lens());

    let filter = match settings.light_filter() {
        LightFilter::NoFilter => "000",
        LightFilter::UvCut400 => "400",
        LightFilter::UvCut420 => "420",
        LightFilter::UvCut460 => "460",
        other => {
            return Err(Error::InvalidParameter(format!(
                "filter {} not available on {}",
                other, FAMILY
            )))
        }
    };

    let specular = match settings.specular() {
        Specular::Included => 'I',
        Specular::Excluded => 'E',
    };

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

    Ok(format!("{}{}{}{}", specular, aperture, lens, filter))
}

/// Number of readings averaged per calibration step
///
/// Taken from the `calibration_readings` channel parameter, default 1.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] when the parameter is not a number
/// in `1..=99`.
pub fn calibration_readings(settings: &SpectroSettings) -> Result<u32> {
    let Some(raw) = settings.channel_parameter(parameters::CALIBRATION_READINGS) else {
        return Ok(1);
    };

    match raw.parse::<u32>() {
        Ok(count) if (1..=MAX_CALIBRATION_READINGS).contains(&count) => Ok(count),
        _ => Err(Error::InvalidParameter(format!(
            "{}={}",
            parameters::CALIBRATION_READINGS,
            raw
        ))),
    }
}

fn command_bytes(body: &str) -> Bytes {
    Bytes::from(format!("{}{}", body, TERMINATOR))
}

/// Check whether the first line of `response` is an error report
fn starts_with_error(response: &[u8]) -> bool {
    let first = response.split(|byte| *byte == LF).next().unwrap_or_default();
    String::from_utf8_lossy(first).trim().starts_with(ERROR_PREFIX)
}

fn single_line_complete(response: &[u8]) -> bool {
    response.last() == Some(&LF)
}

/// `MR `: measurement
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
        "xrite.measure"
    }

    fn construct(&self) -> Bytes {
        command_bytes("M")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);
        let lines = token::lines(&text);

        let Some((head, data)) = lines.split_first() else {
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        };

        let (mut status, reported) = decode_status_line(head);
        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        if lines.len() != MEASURE_LINES {
            debug!(expected = MEASURE_LINES, actual = lines.len(), "Unexpected line count");
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        let rows: Vec<Vec<&str>> = data.iter().map(|line| token::fields(line, ',')).collect();
        if rows.iter().any(|row| row.len() != VALUES_PER_LINE) {
            debug!("Malformed measurement data line");
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        let values = token::parse_samples(
            rows.into_iter().flatten(),
            WAVELENGTHS.start_nm(),
            WAVELENGTHS.interval_nm(),
            VALUE_DIVISOR,
            &mut status,
        );

        let mut settings = reported.unwrap_or_else(|| self.settings.clone());
        if let Some(location) = self.settings.location() {
            settings = settings.with_location(location);
        }

        SpectroEvent::reading(self.name(), SpectroReading::new(status, settings, values))
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        if starts_with_error(response) {
            return single_line_complete(response);
        }
        response.iter().filter(|byte| **byte == LF).count() >= MEASURE_LINES
    }
}

/// `B<n>R ` / `W<n>R `: calibration averaged over `n` readings
#[derive(Debug, Clone)]
pub struct CalibrateCommand {
    step: CalibrationStep,
    readings: u32,
}

impl CalibrateCommand {
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for the green step.
    pub fn new(step: CalibrationStep, readings: u32) -> Result<Self> {
        match step {
            CalibrationStep::Black | CalibrationStep::White => Ok(Self { step, readings }),
            other => Err(Error::not_supported(FAMILY, Operation::Calibrate(other))),
        }
    }
}

impl SpectroCommand for CalibrateCommand {
    fn name(&self) -> &'static str {
        "xrite.calibrate"
    }

    fn construct(&self) -> Bytes {
        let letter = match self.step {
            CalibrationStep::Black => 'B',
            _ => 'W',
        };
        command_bytes(&format!("{}{}", letter, self.readings))
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);

        if let Some(status) = decode_error(&text) {
            warn!(step = %self.step, status = %status, "Calibration rejected");
            return SpectroEvent::status(self.name(), status);
        }

        let status = if text == "OK" {
            SpectroStatus::ok().with_message(StatusMessage::CalibrationDone)
        } else {
            SpectroStatus::failure(StatusMessage::UnknownString)
        };
        SpectroEvent::status(self.name(), status)
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        single_line_complete(response)
    }
}

/// `SR `: status line
#[derive(Debug, Clone, Default)]
pub struct StatusCommand;

impl SpectroCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "xrite.status"
    }

    fn construct(&self) -> Bytes {
        command_bytes("S")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);
        let first = token::lines(&text).into_iter().next().unwrap_or_default();

        match decode_status_line(first) {
            (status, Some(settings)) => {
                SpectroEvent::with_payload(self.name(), status, EventPayload::Settings(settings))
            }
            (status, None) => SpectroEvent::status(self.name(), status),
        }
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        single_line_complete(response)
    }
}

/// `P<spec><ap><lens><filter3>R `: apply settings, answered by the new status line
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
        "xrite.settings"
    }

    fn construct(&self) -> Bytes {
        command_bytes(&format!("P{}", self.encoded))
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        StatusCommand.interpret(response)
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        single_line_complete(response)
    }
}

/// `IR `: identification line
#[derive(Debug, Clone, Default)]
pub struct IdentifyCommand;

impl SpectroCommand for IdentifyCommand {
    fn name(&self) -> &'static str {
        "xrite.identify"
    }

    fn construct(&self) -> Bytes {
        command_bytes("I")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let text = token::response_text(response);

        if let Some(status) = decode_error(&text) {
            return SpectroEvent::status(self.name(), status);
        }
        if text.is_empty() {
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        let status = SpectroStatus::ok().with_message(StatusMessage::Identity(text.clone()));
        SpectroEvent::with_payload(self.name(), status, EventPayload::Identity(text))
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        single_line_complete(response)
    }
}

/// Command set of the multi-line family
#[derive(Debug, Clone, Default)]
pub struct XriteCommands;

impl CommandSet for XriteCommands {
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
            Operation::Calibrate(step) => {
                Box::new(CalibrateCommand::new(step, calibration_readings(settings)?)?)
            }
            Operation::QueryStatus => Box::new(StatusCommand),
            Operation::ApplySettings => Box::new(SettingsCommand::new(settings)?),
            Operation::Identify => Box::new(IdentifyCommand),
            other => return Err(Error::not_supported(FAMILY, other)),
        };
        Ok(command)
    }
}
