//! Result-code + comma-delimited family (Konica Minolta CM-2600d)
//!
//! Commands are three-letter mnemonics with optional comma-separated
//! arguments, terminated by CRLF. Every reply starts with a four character
//! result code, `OK` or `ER` followed by two digits, optionally followed by
//! comma-separated fields:
//!
//! ```text
//! OK00,85.12,84.90,...      measurement: 31 values, 400-700nm @10nm, percent
//! OK00,0,1,1,1,3,1,0,0      condition: specular, aperture, UV, lens + 4 parameters
//! ER07                      error, no fields
//! ```

use bytes::Bytes;
use spectro_types::{
    Aperture, CalibrationStep, EventPayload, LensPosition, LightFilter, Severity, SpectroEvent,
    SpectroReading, SpectroSettings, SpectroStatus, Specular, StatusMessage, WavelengthRange,
};
use tracing::debug;

use crate::command::{CommandSet, Operation, SpectroCommand};
use crate::constants::parameters;
use crate::error::{Error, Result};
use crate::token;

pub const FAMILY: &str = "minolta";

pub const TERMINATOR: &str = "\r\n";

/// Sampled wavelengths of a measurement
pub const WAVELENGTHS: WavelengthRange = WavelengthRange::fixed(400, 700, 10);

/// Fields after the result code in a measurement reply
pub const MEASURE_TOKENS: usize = 31;

/// Fields after the result code in a condition reply
pub const SETTINGS_TOKENS: usize = 8;

/// Fields after the result code in an identification reply
pub const IDENTIFY_TOKENS: usize = 3;

/// Raw values are percentages
pub const VALUE_DIVISOR: f64 = 100.0;

/// Stored sample capacity
pub const MAX_SAMPLES: u32 = 1024;

/// Stored standard (target) capacity
pub const MAX_STANDARDS: u32 = 700;

/// Condition parameters carried after the four optical fields, with the
/// value written when the settings do not provide one
const CONDITION_PARAMETERS: [(&str, &str); 4] = [
    (parameters::AUTO_AVERAGE, "1"),
    (parameters::MANUAL_AVERAGE, "1"),
    (parameters::DELAY, "0"),
    (parameters::DISPLAY_MODE, "0"),
];

/// Look up a result code in the fixed table
fn lookup(ok: bool, code: u8) -> Option<(Severity, StatusMessage)> {
    let entry = match (ok, code) {
        (true, 0) => (Severity::Message, StatusMessage::Ok),
        (true, 1) => (Severity::Warning, StatusMessage::WarnBattery),
        (true, 2) => (Severity::Warning, StatusMessage::WarnLight),
        (true, 3) => (Severity::Warning, StatusMessage::WarnCalibrationDue),
        (false, 0) => (Severity::Error, StatusMessage::ErrorCommand),
        (false, 1) => (Severity::Error, StatusMessage::ErrorParameter),
        (false, 2) => (Severity::Error, StatusMessage::ErrorMemory),
        (false, 3) => (Severity::Error, StatusMessage::ErrorBusy),
        (false, 5) => (Severity::Error, StatusMessage::ErrorNoData),
        (false, 7) => (Severity::Error, StatusMessage::ErrorCalibration1),
        (false, 8) => (Severity::Error, StatusMessage::ErrorCalibration2),
        (false, 10) => (Severity::Error, StatusMessage::ErrorLamp),
        (false, 11) => (Severity::Error, StatusMessage::ErrorMeasurement),
        (false, 17) => (Severity::Error, StatusMessage::ErrorBattery),
        (false, 20) => (Severity::Error, StatusMessage::ErrorCharging),
        _ => return None,
    };
    Some(entry)
}

/// Translate an `OKnn`/`ERnn` result code into a status
///
/// Anything that does not have that exact shape, or a code missing from the
/// table, yields a single [`StatusMessage::UnknownString`] error.
///
/// # Examples
///
/// ```
/// use spectro_core::families::minolta::result_code;
/// use spectro_types::StatusMessage;
///
/// assert!(result_code("OK00").is_success());
/// assert_eq!(result_code("ER07").errors(), &[StatusMessage::ErrorCalibration1]);
/// assert_eq!(result_code("XX99").errors(), &[StatusMessage::UnknownString]);
/// ```
pub fn result_code(code: &str) -> SpectroStatus {
    let parsed = match code.as_bytes() {
        [b'O', b'K', tens, units] if tens.is_ascii_digit() && units.is_ascii_digit() => {
            lookup(true, (tens - b'0') * 10 + (units - b'0'))
        }
        [b'E', b'R', tens, units] if tens.is_ascii_digit() && units.is_ascii_digit() => {
            lookup(false, (tens - b'0') * 10 + (units - b'0'))
        }
        _ => None,
    };

    match parsed {
        Some((severity, message)) => {
            let mut status = SpectroStatus::new();
            status.push(severity, message);
            status
        }
        None => SpectroStatus::failure(StatusMessage::UnknownString),
    }
}

/// Split a reply into its result status and the fields after the code
fn split_reply(response: &[u8]) -> (SpectroStatus, Vec<String>) {
    let text = token::response_text(response);
    let mut fields = token::fields(&text, ',').into_iter();
    let status = result_code(fields.next().unwrap_or_default());
    (status, fields.map(str::to_string).collect())
}

fn specular_code(specular: Specular) -> char {
    match specular {
        Specular::Included => '0',
        Specular::Excluded => '1',
    }
}

fn aperture_code(aperture: Aperture) -> Result<char> {
    match aperture {
        Aperture::Medium => Ok('0'),
        Aperture::Small => Ok('1'),
        other => Err(Error::InvalidParameter(format!(
            "aperture {} not available on {}",
            other, FAMILY
        ))),
    }
}

fn filter_code(filter: LightFilter) -> Result<char> {
    match filter {
        LightFilter::NoFilter => Ok('0'),
        LightFilter::UvCut400 => Ok('1'),
        LightFilter::UvAdjusted => Ok('2'),
        other => Err(Error::InvalidParameter(format!(
            "filter {} not available on {}",
            other, FAMILY
        ))),
    }
}

fn lens_code(lens: LensPosition) -> Result<char> {
    match lens {
        LensPosition::MediumArea => Ok('0'),
        LensPosition::SmallArea => Ok('1'),
        other => Err(Error::InvalidParameter(format!(
            "lens position {} not available on {}",
            other, FAMILY
        ))),
    }
}

/// Encode the eight condition fields written by `CPS` and read by `CPR`
pub fn encode_settings(settings: &SpectroSettings) -> Result<Vec<String>> {
    let aperture = settings.aperture().unwrap_or(Aperture::Medium);
    let lens = settings.lens_position().unwrap_or_else(|| aperture.paired_lens());

    let mut fields = vec![
        specular_code(settings.specular()).to_string(),
        aperture_code(aperture)?.to_string(),
        filter_code(settings.light_filter())?.to_string(),
        lens_code(lens)?.to_string(),
    ];

    for (key, default) in CONDITION_PARAMETERS {
        let value = settings.channel_parameter(key).unwrap_or(default);
        if value.parse::<u32>().is_err() {
            return Err(Error::InvalidParameter(format!("{}={}", key, value)));
        }
        fields.push(value.to_string());
    }

    Ok(fields)
}

/// Decode the eight condition fields of a `CPR` reply
///
/// Aperture and UV codes fall back to a safe default with a warning;
/// specular and lens codes have none and produce errors.
pub fn decode_settings(fields: &[String], status: &mut SpectroStatus) -> SpectroSettings {
    let field = |index: usize| fields.get(index).map(String::as_str).unwrap_or_default();
    let mut settings = SpectroSettings::new();

    match field(0) {
        "0" => settings = settings.with_specular(Specular::Included),
        "1" => settings = settings.with_specular(Specular::Excluded),
        other => status.add_error(StatusMessage::UnknownSpecular(other.to_string())),
    }

    let aperture = match field(1) {
        "0" => Aperture::Medium,
        "1" => Aperture::Small,
        other => {
            status.add_warning(StatusMessage::UnknownAperture(other.to_string()));
            Aperture::Medium
        }
    };
    settings = settings.with_aperture(aperture);

    let filter = match field(2) {
        "0" => LightFilter::NoFilter,
        "1" => LightFilter::UvCut400,
        "2" => LightFilter::UvAdjusted,
        other => {
            status.add_warning(StatusMessage::UnknownFilter(other.to_string()));
            LightFilter::NoFilter
        }
    };
    settings = settings.with_light_filter(filter);

    match field(3) {
        "0" => settings = settings.with_lens_position(LensPosition::MediumArea),
        "1" => settings = settings.with_lens_position(LensPosition::SmallArea),
        other => status.add_error(StatusMessage::UnknownLensPosition(other.to_string())),
    }

    for (offset, (key, _)) in CONDITION_PARAMETERS.iter().enumerate() {
        let value = field(4 + offset);
        if value.parse::<u32>().is_ok() {
            settings = settings.with_channel_parameter(*key, value);
        } else {
            status.add_warning(StatusMessage::InvalidParameter(format!("{}={}", key, value)));
        }
    }

    settings
}

fn command_bytes(mnemonic: &str) -> Bytes {
    Bytes::from(format!("{}{}", mnemonic, TERMINATOR))
}

fn is_complete_line(response: &[u8]) -> bool {
    response.ends_with(TERMINATOR.as_bytes())
}

/// Decode a spectral reply shared by `MES`, `SDR` and `TDR`
fn interpret_spectrum(
    name: &'static str,
    settings: &SpectroSettings,
    response: &[u8],
) -> SpectroEvent {
    let (mut status, fields) = split_reply(response);

    if status.is_failure() {
        return SpectroEvent::status(name, status);
    }

    if fields.len() != MEASURE_TOKENS {
        debug!(
            expected = MEASURE_TOKENS,
            actual = fields.len(),
            "Unexpected spectral token count"
        );
        return SpectroEvent::status(name, SpectroStatus::failure(StatusMessage::InvalidReturn));
    }

    let values = token::parse_samples(
        fields.iter().map(String::as_str),
        WAVELENGTHS.start_nm(),
        WAVELENGTHS.interval_nm(),
        VALUE_DIVISOR,
        &mut status,
    );

    SpectroEvent::reading(name, SpectroReading::new(status, settings.clone(), values))
}

/// `MES`: measurement
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
        "minolta.measure"
    }

    fn construct(&self) -> Bytes {
        command_bytes("MES")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        interpret_spectrum(self.name(), &self.settings, response)
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// `CZR` / `CWR`: zero and white calibration
#[derive(Debug, Clone)]
pub struct CalibrateCommand {
    step: CalibrationStep,
}

impl CalibrateCommand {
    /// Only black (zero) and white steps exist on this family
    pub fn new(step: CalibrationStep) -> Result<Self> {
        match step {
            CalibrationStep::Black | CalibrationStep::White => Ok(Self { step }),
            other => Err(Error::not_supported(FAMILY, Operation::Calibrate(other))),
        }
    }
}

impl SpectroCommand for CalibrateCommand {
    fn name(&self) -> &'static str {
        "minolta.calibrate"
    }

    fn construct(&self) -> Bytes {
        match self.step {
            CalibrationStep::Black => command_bytes("CZR"),
            _ => command_bytes("CWR"),
        }
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, _) = split_reply(response);
        if status.is_success() {
            status.add_message(StatusMessage::CalibrationDone);
        }
        SpectroEvent::status(self.name(), status)
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// `CPR`: read measuring conditions
#[derive(Debug, Clone, Default)]
pub struct StatusCommand;

impl SpectroCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "minolta.status"
    }

    fn construct(&self) -> Bytes {
        command_bytes("CPR")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, fields) = split_reply(response);

        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        if fields.len() != SETTINGS_TOKENS {
            return SpectroEvent::status(
                self.name(),
                SpectroStatus::failure(StatusMessage::InvalidReturn),
            );
        }

        let settings = decode_settings(&fields, &mut status);

        if status.is_success() {
            SpectroEvent::with_payload(self.name(), status, EventPayload::Settings(settings))
        } else {
            SpectroEvent::status(self.name(), status)
        }
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// `CPS`: write measuring conditions
#[derive(Debug, Clone)]
pub struct SettingsCommand {
    settings: SpectroSettings,
    fields: Vec<String>,
}

impl SettingsCommand {
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when a setting has no code on
    /// this family.
    pub fn new(settings: SpectroSettings) -> Result<Self> {
        let fields = encode_settings(&settings)?;
        Ok(Self { settings, fields })
    }
}

impl SpectroCommand for SettingsCommand {
    fn name(&self) -> &'static str {
        "minolta.settings"
    }

    fn construct(&self) -> Bytes {
        command_bytes(&format!("CPS,{}", self.fields.join(",")))
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (status, _) = split_reply(response);

        if status.is_success() {
            SpectroEvent::with_payload(
                self.name(),
                status,
                EventPayload::Settings(self.settings.clone()),
            )
        } else {
            SpectroEvent::status(self.name(), status)
        }
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// `IDR`: model, firmware and serial number
#[derive(Debug, Clone, Default)]
pub struct IdentifyCommand;

impl SpectroCommand for IdentifyCommand {
    fn name(&self) -> &'static str {
        "minolta.identify"
    }

    fn construct(&self) -> Bytes {
        command_bytes("IDR")
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, fields) = split_reply(response);

        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        let [model, firmware, serial] = fields.as_slice() else {
            return SpectroEvent::status(
                self.name(),
                SpectroStatus::failure(StatusMessage::InvalidReturn),
            );
        };

        let identity = format!("{} {} S/N {}", model, firmware, serial);
        status.add_message(StatusMessage::Identity(identity.clone()));
        SpectroEvent::with_payload(self.name(), status, EventPayload::Identity(identity))
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// Offline memory area
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Storage {
    Samples,
    Standards,
}

impl Storage {
    fn capacity(self) -> u32 {
        match self {
            Self::Samples => MAX_SAMPLES,
            Self::Standards => MAX_STANDARDS,
        }
    }
}

/// `SNR` / `TNR`: number of stored samples or standards
#[derive(Debug, Clone)]
pub struct CountCommand {
    storage: Storage,
}

impl CountCommand {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

impl SpectroCommand for CountCommand {
    fn name(&self) -> &'static str {
        match self.storage {
            Storage::Samples => "minolta.sample_count",
            Storage::Standards => "minolta.standard_count",
        }
    }

    fn construct(&self) -> Bytes {
        match self.storage {
            Storage::Samples => command_bytes("SNR"),
            Storage::Standards => command_bytes("TNR"),
        }
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (status, fields) = split_reply(response);

        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        match fields.as_slice() {
            [count] => match count.parse::<u32>() {
                Ok(count) => {
                    SpectroEvent::with_payload(self.name(), status, EventPayload::Count(count))
                }
                Err(_) => SpectroEvent::status(
                    self.name(),
                    SpectroStatus::failure(StatusMessage::InvalidReturn),
                ),
            },
            _ => SpectroEvent::status(
                self.name(),
                SpectroStatus::failure(StatusMessage::InvalidReturn),
            ),
        }
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// `SDR,nnnn` / `TDR,nnnn`: read a stored sample or standard
///
/// The position is always four zero-padded digits.
#[derive(Debug, Clone)]
pub struct RetrieveCommand {
    storage: Storage,
    position: u32,
    settings: SpectroSettings,
}

impl RetrieveCommand {
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when `position` is outside
    /// `1..=capacity`.
    pub fn new(storage: Storage, position: u32, settings: SpectroSettings) -> Result<Self> {
        if position == 0 || position > storage.capacity() {
            return Err(Error::InvalidParameter(format!(
                "memory position {} outside 1..={}",
                position,
                storage.capacity()
            )));
        }

        Ok(Self {
            storage,
            position,
            settings,
        })
    }
}

impl SpectroCommand for RetrieveCommand {
    fn name(&self) -> &'static str {
        match self.storage {
            Storage::Samples => "minolta.retrieve_sample",
            Storage::Standards => "minolta.retrieve_standard",
        }
    }

    fn construct(&self) -> Bytes {
        let mnemonic = match self.storage {
            Storage::Samples => "SDR",
            Storage::Standards => "TDR",
        };
        command_bytes(&format!("{},{:04}", mnemonic, self.position))
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        interpret_spectrum(self.name(), &self.settings, response)
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        is_complete_line(response)
    }
}

/// Command set of the result-code family
#[derive(Debug, Clone, Default)]
pub struct MinoltaCommands;

impl CommandSet for MinoltaCommands {
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
            Operation::Calibrate(step) => Box::new(CalibrateCommand::new(step)?),
            Operation::QueryStatus => Box::new(StatusCommand),
            Operation::ApplySettings => Box::new(SettingsCommand::new(settings.clone())?),
            Operation::Identify => Box::new(IdentifyCommand),
            Operation::QueryStoredSamples => Box::new(CountCommand::new(Storage::Samples)),
            Operation::QueryStandards => Box::new(CountCommand::new(Storage::Standards)),
            Operation::RetrieveSample(position) => {
                Box::new(RetrieveCommand::new(Storage::Samples, position, settings.clone())?)
            }
            Operation::RetrieveStandard(position) => {
                Box::new(RetrieveCommand::new(Storage::Standards, position, settings.clone())?)
            }
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn spectrum(code: &str, count: usize) -> Vec<u8> {
        let mut reply = code.to_string();
        for i in 0..count {
            reply.push_str(&format!(",{}.00", 50 + i));
        }
        reply.push_str("\r\n");
        reply.into_bytes()
    }

    #[test]
    fn test_result_code_table() {
        let ok = result_code("OK00");
        assert!(ok.is_success());
        assert_eq!(ok.messages(), &[StatusMessage::Ok]);

        let light = result_code("OK02");
        assert!(light.is_success());
        assert_eq!(light.warnings(), &[StatusMessage::WarnLight]);

        let calibration = result_code("ER07");
        assert!(calibration.is_failure());
        assert_eq!(calibration.errors(), &[StatusMessage::ErrorCalibration1]);

        assert_eq!(result_code("XX99").errors(), &[StatusMessage::UnknownString]);
    }

    #[test]
    fn test_result_code_shape() {
        for code in ["", "OK", "OK0", "OK000", "ok00", "OKA0", "ER99", "OK42"] {
            let status = result_code(code);
            assert_eq!(status.errors(), &[StatusMessage::UnknownString], "{:?}", code);
        }
    }

    #[test]
    fn test_commands_are_crlf_terminated() {
        assert_eq!(MeasureCommand::new(SpectroSettings::default()).construct().as_ref(), b"MES\r\n");
        assert_eq!(
            CalibrateCommand::new(CalibrationStep::Black).unwrap().construct().as_ref(),
            b"CZR\r\n"
        );
        assert_eq!(
            CalibrateCommand::new(CalibrationStep::White).unwrap().construct().as_ref(),
            b"CWR\r\n"
        );
        assert!(CalibrateCommand::new(CalibrationStep::Green).is_err());
    }

    #[test]
    fn test_measurement_wavelengths() {
        let event = MeasureCommand::new(SpectroSettings::default()).interpret(&spectrum("OK00", 31));
        let reading = event.reading_payload().unwrap();

        assert_eq!(reading.len(), 31);
        for (n, (wavelength, value)) in reading.values().iter().enumerate() {
            assert_eq!(*wavelength, 400 + 10 * n as u32);
            assert_eq!(*value, (50 + n) as f64 / 100.0);
        }
    }

    #[test]
    fn test_measurement_normalization() {
        let mut reply = String::from("OK00,85.00");
        for _ in 1..31 {
            reply.push_str(",10.00");
        }
        reply.push_str("\r\n");

        let event = MeasureCommand::new(SpectroSettings::default()).interpret(reply.as_bytes());
        assert_eq!(event.reading_payload().unwrap().value_at(400), Some(0.85));
    }

    #[test]
    fn test_measurement_token_gate() {
        for count in [0, 8, 30, 32] {
            let event = MeasureCommand::new(SpectroSettings::default()).interpret(&spectrum("OK00", count));
            assert_eq!(event.spectro_status().errors(), &[StatusMessage::InvalidReturn]);
            assert!(event.reading_payload().is_none());
        }
    }

    #[test]
    fn test_measurement_warning_code_kept() {
        let event = MeasureCommand::new(SpectroSettings::default()).interpret(&spectrum("OK02", 31));
        assert!(event.is_success());
        assert_eq!(event.spectro_status().warnings(), &[StatusMessage::WarnLight]);
        assert!(event.reading_payload().is_some());
    }

    #[test]
    fn test_measurement_bad_token() {
        let mut reply = String::from("OK00");
        for i in 0..31 {
            if i == 4 {
                reply.push_str(",--");
            } else {
                reply.push_str(",42.0");
            }
        }

        let event = MeasureCommand::new(SpectroSettings::default()).interpret(reply.as_bytes());
        let reading = event.reading_payload().unwrap();
        assert_eq!(reading.len(), 30);
        assert_eq!(reading.value_at(440), None);
        assert_eq!(
            event.spectro_status().warnings(),
            &[StatusMessage::InvalidValue {
                wavelength: 440,
                token: "--".into()
            }]
        );
    }

    #[test]
    fn test_error_reply_has_no_reading() {
        let event = MeasureCommand::new(SpectroSettings::default()).interpret(b"ER11\r\n");
        assert_eq!(event.spectro_status().errors(), &[StatusMessage::ErrorMeasurement]);
        assert!(event.reading_payload().is_none());
    }

    #[test]
    fn test_condition_reply() {
        let event = StatusCommand.interpret(b"OK00,1,1,2,1,3,1,0,0\r\n");
        let settings = event.settings_payload().unwrap();

        assert_eq!(settings.specular(), Specular::Excluded);
        assert_eq!(settings.aperture(), Some(Aperture::Small));
        assert_eq!(settings.light_filter(), LightFilter::UvAdjusted);
        assert_eq!(settings.lens_position(), Some(LensPosition::SmallArea));
        assert_eq!(settings.channel_parameter(parameters::AUTO_AVERAGE), Some("3"));
    }

    #[test]
    fn test_condition_fallbacks() {
        let event = StatusCommand.interpret(b"OK00,0,9,9,0,1,1,0,0\r\n");
        assert!(event.is_success());
        assert_eq!(event.spectro_status().warnings().len(), 2);

        let settings = event.settings_payload().unwrap();
        assert_eq!(settings.aperture(), Some(Aperture::Medium));
        assert_eq!(settings.light_filter(), LightFilter::NoFilter);
    }

    #[test]
    fn test_condition_hard_errors() {
        let event = StatusCommand.interpret(b"OK00,7,0,0,7,1,1,0,0\r\n");
        assert!(event.is_failure());
        assert_eq!(
            event.spectro_status().errors(),
            &[
                StatusMessage::UnknownSpecular("7".into()),
                StatusMessage::UnknownLensPosition("7".into())
            ]
        );
        assert!(event.settings_payload().is_none());
    }

    #[test]
    fn test_condition_token_gate() {
        let event = StatusCommand.interpret(b"OK00,0,0,0\r\n");
        assert_eq!(event.spectro_status().errors(), &[StatusMessage::InvalidReturn]);
    }

    #[test]
    fn test_unsupported_settings_rejected() {
        let settings = SpectroSettings::new().with_aperture(Aperture::Large);
        assert!(matches!(SettingsCommand::new(settings), Err(Error::InvalidParameter(_))));

        let settings = SpectroSettings::new().with_channel_parameter(parameters::DELAY, "soon");
        assert!(matches!(SettingsCommand::new(settings), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_identify() {
        let event = IdentifyCommand.interpret(b"OK00,CM-2600d,1.10,10012345\r\n");
        assert_eq!(
            event.payload(),
            &EventPayload::Identity("CM-2600d 1.10 S/N 10012345".into())
        );
        assert!(IdentifyCommand.interpret(b"OK00,CM-2600d\r\n").is_failure());
    }

    #[test]
    fn test_counts_and_retrieval() {
        let count = CountCommand::new(Storage::Samples);
        assert_eq!(count.construct().as_ref(), b"SNR\r\n");
        assert_eq!(count.interpret(b"OK00,17\r\n").count_payload(), Some(17));
        assert!(count.interpret(b"OK00,many\r\n").is_failure());

        let retrieve = RetrieveCommand::new(Storage::Standards, 12, SpectroSettings::default()).unwrap();
        assert_eq!(retrieve.construct().as_ref(), b"TDR,0012\r\n");
        assert!(retrieve.interpret(&spectrum("OK00", 31)).reading_payload().is_some());

        let first = RetrieveCommand::new(Storage::Samples, 1, SpectroSettings::default()).unwrap();
        assert_eq!(first.construct().as_ref(), b"SDR,0001\r\n");
        let last = RetrieveCommand::new(Storage::Samples, MAX_SAMPLES, SpectroSettings::default()).unwrap();
        assert_eq!(last.construct().as_ref(), b"SDR,1024\r\n");

        assert!(RetrieveCommand::new(Storage::Samples, 0, SpectroSettings::default()).is_err());
        assert!(RetrieveCommand::new(Storage::Standards, MAX_STANDARDS + 1, SpectroSettings::default()).is_err());
    }

    #[test]
    fn test_completion() {
        let command = StatusCommand;
        assert!(!command.is_complete(b"OK00,1"));
        assert!(!command.is_complete(b"OK00,1\r"));
        assert!(command.is_complete(b"OK00,1\r\n"));
    }

    fn settings_strategy() -> impl Strategy<Value = SpectroSettings> {
        (
            prop_oneof![Just(Specular::Included), Just(Specular::Excluded)],
            prop_oneof![Just(Aperture::Medium), Just(Aperture::Small)],
            prop_oneof![
                Just(LightFilter::NoFilter),
                Just(LightFilter::UvCut400),
                Just(LightFilter::UvAdjusted)
            ],
            prop_oneof![Just(LensPosition::MediumArea), Just(LensPosition::SmallArea)],
            1u32..10,
            1u32..10,
            0u32..5,
            0u32..3,
        )
            .prop_map(|(specular, aperture, filter, lens, auto, manual, delay, display)| {
                SpectroSettings::new()
                    .with_specular(specular)
                    .with_aperture(aperture)
                    .with_light_filter(filter)
                    .with_lens_position(lens)
                    .with_channel_parameter(parameters::AUTO_AVERAGE, auto.to_string())
                    .with_channel_parameter(parameters::MANUAL_AVERAGE, manual.to_string())
                    .with_channel_parameter(parameters::DELAY, delay.to_string())
                    .with_channel_parameter(parameters::DISPLAY_MODE, display.to_string())
            })
    }

    proptest! {
        #[test]
        fn prop_written_conditions_read_back(settings in settings_strategy()) {
            let written = SettingsCommand::new(settings.clone()).unwrap().construct();
            let text = std::str::from_utf8(&written).unwrap();
            let fields = text.trim_end().strip_prefix("CPS,").unwrap();

            let reply = format!("OK00,{}\r\n", fields);
            let event = StatusCommand.interpret(reply.as_bytes());

            prop_assert_eq!(event.settings_payload(), Some(&settings));
        }
    }
}
