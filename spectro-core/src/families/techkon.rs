//! Hex-frame family (Techkon SpectroDens class instruments)
//!
//! Requests and replies are [`HexFrame`]s. A request payload is an opcode
//! followed by its parameters; a reply payload is a status byte followed by
//! opcode-specific data.
//!
//! | Opcode | Request params | Reply data |
//! |---|---|---|
//! | `0x01` identify | - | ASCII identification |
//! | `0x02` status | - | specular, aperture, lens, filter |
//! | `0x10` measure | - | 31 x big-endian u16, 1/10000 reflectance |
//! | `0x20` calibrate | 0 black, 1 white | - |
//! | `0x30` settings | specular, aperture, lens, filter | - |

use bytes::{Buf, Bytes};
use spectro_types::{
    Aperture, CalibrationStep, EventPayload, LensPosition, LightFilter, Severity, SpectroEvent,
    SpectroReading, SpectroSettings, SpectroStatus, Specular, StatusMessage, WavelengthRange,
};
use tracing::{debug, warn};

use crate::command::{CommandSet, Operation, SpectroCommand};
use crate::constants::CR;
use crate::error::{Error, Result};
use crate::frame::HexFrame;

pub const FAMILY: &str = "techkon";

pub mod opcode {
    pub const IDENTIFY: u8 = 0x01;
    pub const STATUS: u8 = 0x02;
    pub const MEASURE: u8 = 0x10;
    pub const CALIBRATE: u8 = 0x20;
    pub const SETTINGS: u8 = 0x30;
}

pub const WAVELENGTHS: WavelengthRange = WavelengthRange::fixed(400, 700, 10);

/// Measurement data length in bytes
pub const MEASURE_DATA_LEN: usize = 31 * 2;

/// Settings data length in bytes
pub const SETTINGS_DATA_LEN: usize = 4;

/// Raw values are 1/10000 reflectance
pub const VALUE_DIVISOR: f64 = 10_000.0;

/// Raw value reported for an overranged wavelength
pub const OVERRANGE: u16 = 0xFFFF;

fn status_entry(code: u8) -> (Severity, StatusMessage) {
    match code {
        0x00 => (Severity::Message, StatusMessage::Ok),
        0x01 => (Severity::Warning, StatusMessage::WarnCalibrationDue),
        0x02 => (Severity::Warning, StatusMessage::WarnBattery),
        0x80 => (Severity::Error, StatusMessage::ErrorCommand),
        0x81 => (Severity::Error, StatusMessage::ErrorParameter),
        0x82 => (Severity::Error, StatusMessage::NotCalibrated),
        0x83 => (Severity::Error, StatusMessage::ErrorMeasurement),
        0x84 => (Severity::Error, StatusMessage::ErrorChecksum),
        _ => (Severity::Error, StatusMessage::UnknownString),
    }
}

/// Decode a reply frame into its status and data bytes
///
/// Frame-level problems produce a single error: a checksum mismatch is
/// reported as [`StatusMessage::ErrorChecksum`], anything else as
/// [`StatusMessage::InvalidReturn`].
pub fn decode_reply(response: &[u8]) -> (SpectroStatus, Bytes) {
    let mut payload = match HexFrame::decode(response) {
        Ok(frame) => frame.payload,
        Err(Error::ChecksumMismatch { expected, received }) => {
            warn!(expected, received, "Reply checksum mismatch");
            return (SpectroStatus::failure(StatusMessage::ErrorChecksum), Bytes::new());
        }
        Err(e) => {
            debug!(error = %e, "Undecodable reply frame");
            return (SpectroStatus::failure(StatusMessage::InvalidReturn), Bytes::new());
        }
    };

    if !payload.has_remaining() {
        return (SpectroStatus::failure(StatusMessage::InvalidReturn), Bytes::new());
    }

    let (severity, message) = status_entry(payload.get_u8());
    let mut status = SpectroStatus::new();
    status.push(severity, message);
    (status, payload)
}

/// Encode the four settings bytes
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for optics this family cannot select.
pub fn encode_settings(settings: &SpectroSettings) -> Result<[u8; SETTINGS_DATA_LEN]> {
    let aperture = settings.aperture().unwrap_or(Aperture::Large);
    let lens = settings.lens_position().unwrap_or_else(|| aperture.paired_lens());

    let specular = match settings.specular() {
        Specular::Included => 0,
        Specular::Excluded => 1,
    };

    let aperture = match aperture {
        Aperture::Large => 0,
        Aperture::Medium => 1,
        Aperture::Small => 2,
        other => {
            return Err(Error::InvalidParameter(format!(
                "aperture {} not available on {}",
                other, FAMILY
            )))
        }
    };

    let lens = match lens {
        LensPosition::LargeArea => 0,
        LensPosition::MediumArea => 1,
        LensPosition::SmallArea => 2,
        other => {
            return Err(Error::InvalidParameter(format!(
                "lens position {} not available on {}",
                other, FAMILY
            )))
        }
    };

    let filter = match settings.light_filter() {
        LightFilter::NoFilter => 0,
        LightFilter::UvCut400 => 1,
        LightFilter::UvAdjusted => 2,
        other => {
            return Err(Error::InvalidParameter(format!(
                "filter {} not available on {}",
                other, FAMILY
            )))
        }
    };

    Ok([specular, aperture, lens, filter])
}

/// Decode the four settings bytes, adding problems to `status`
pub fn decode_settings(data: &[u8], status: &mut SpectroStatus) -> Option<SpectroSettings> {
    let &[specular, aperture, lens, filter] = data else {
        status.add_error(StatusMessage::InvalidReturn);
        return None;
    };

    let mut settings = SpectroSettings::new();

    match specular {
        0 => settings = settings.with_specular(Specular::Included),
        1 => settings = settings.with_specular(Specular::Excluded),
        other => status.add_error(StatusMessage::UnknownSpecular(other.to_string())),
    }

    let aperture = match aperture {
        0 => Aperture::Large,
        1 => Aperture::Medium,
        2 => Aperture::Small,
        other => {
            status.add_warning(StatusMessage::UnknownAperture(other.to_string()));
            Aperture::Large
        }
    };
    settings = settings.with_aperture(aperture);

    match lens {
        0 => settings = settings.with_lens_position(LensPosition::LargeArea),
        1 => settings = settings.with_lens_position(LensPosition::MediumArea),
        2 => settings = settings.with_lens_position(LensPosition::SmallArea),
        other => status.add_error(StatusMessage::UnknownLensPosition(other.to_string())),
    }

    let filter = match filter {
        0 => LightFilter::NoFilter,
        1 => LightFilter::UvCut400,
        2 => LightFilter::UvAdjusted,
        other => {
            status.add_warning(StatusMessage::UnknownFilter(other.to_string()));
            LightFilter::NoFilter
        }
    };
    settings = settings.with_light_filter(filter);

    status.is_success().then_some(settings)
}

fn request(payload: Vec<u8>) -> Bytes {
    HexFrame::new(payload).encode().freeze()
}

fn frame_complete(response: &[u8]) -> bool {
    response.last() == Some(&CR)
}

/// Opcode `0x10`: measurement
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
        "techkon.measure"
    }

    fn construct(&self) -> Bytes {
        request(vec![opcode::MEASURE])
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, mut data) = decode_reply(response);

        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        if data.remaining() != MEASURE_DATA_LEN {
            debug!(expected = MEASURE_DATA_LEN, actual = data.remaining(), "Unexpected measurement length");
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        let mut values = std::collections::BTreeMap::new();
        for wavelength in WAVELENGTHS.iter() {
            let raw = data.get_u16();
            if raw == OVERRANGE {
                status.add_warning(StatusMessage::InvalidValue {
                    wavelength,
                    token: format!("0x{:04X}", raw),
                });
            } else {
                values.insert(wavelength, f64::from(raw) / VALUE_DIVISOR);
            }
        }

        SpectroEvent::reading(
            self.name(),
            SpectroReading::new(status, self.settings.clone(), values),
        )
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        frame_complete(response)
    }
}

/// Opcode `0x20`: calibration
#[derive(Debug, Clone)]
pub struct CalibrateCommand {
    step: CalibrationStep,
}

impl CalibrateCommand {
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for the green step.
    pub fn new(step: CalibrationStep) -> Result<Self> {
        match step {
            CalibrationStep::Black | CalibrationStep::White => Ok(Self { step }),
            other => Err(Error::not_supported(FAMILY, Operation::Calibrate(other))),
        }
    }
}

impl SpectroCommand for CalibrateCommand {
    fn name(&self) -> &'static str {
        "techkon.calibrate"
    }

    fn construct(&self) -> Bytes {
        let step = match self.step {
            CalibrationStep::Black => 0,
            _ => 1,
        };
        request(vec![opcode::CALIBRATE, step])
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, _) = decode_reply(response);
        if status.is_success() {
            status.add_message(StatusMessage::CalibrationDone);
        }
        SpectroEvent::status(self.name(), status)
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        frame_complete(response)
    }
}

/// Opcode `0x02`: current settings
#[derive(Debug, Clone, Default)]
pub struct StatusCommand;

impl SpectroCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "techkon.status"
    }

    fn construct(&self) -> Bytes {
        request(vec![opcode::STATUS])
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, data) = decode_reply(response);

        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        match decode_settings(&data, &mut status) {
            Some(settings) => {
                SpectroEvent::with_payload(self.name(), status, EventPayload::Settings(settings))
            }
            None => SpectroEvent::status(self.name(), status),
        }
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        frame_complete(response)
    }
}

/// Opcode `0x30`: apply settings
#[derive(Debug, Clone)]
pub struct SettingsCommand {
    settings: SpectroSettings,
    encoded: [u8; SETTINGS_DATA_LEN],
}

impl SettingsCommand {
    pub fn new(settings: SpectroSettings) -> Result<Self> {
        let encoded = encode_settings(&settings)?;
        Ok(Self { settings, encoded })
    }
}

impl SpectroCommand for SettingsCommand {
    fn name(&self) -> &'static str {
        "techkon.settings"
    }

    fn construct(&self) -> Bytes {
        let mut payload = vec![opcode::SETTINGS];
        payload.extend_from_slice(&self.encoded);
        request(payload)
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (status, _) = decode_reply(response);

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
        frame_complete(response)
    }
}

/// Opcode `0x01`: identification text
#[derive(Debug, Clone, Default)]
pub struct IdentifyCommand;

impl SpectroCommand for IdentifyCommand {
    fn name(&self) -> &'static str {
        "techkon.identify"
    }

    fn construct(&self) -> Bytes {
        request(vec![opcode::IDENTIFY])
    }

    fn interpret(&self, response: &[u8]) -> SpectroEvent {
        let (mut status, data) = decode_reply(response);

        if status.is_failure() {
            return SpectroEvent::status(self.name(), status);
        }

        let identity = String::from_utf8_lossy(&data).trim().to_string();
        if identity.is_empty() {
            return SpectroEvent::status(self.name(), SpectroStatus::failure(StatusMessage::InvalidReturn));
        }

        status.add_message(StatusMessage::Identity(identity.clone()));
        SpectroEvent::with_payload(self.name(), status, EventPayload::Identity(identity))
    }

    fn is_complete(&self, response: &[u8]) -> bool {
        frame_complete(response)
    }
}

/// Command set of the hex-frame family
#[derive(Debug, Clone, Default)]
pub struct TechkonCommands;

impl CommandSet for TechkonCommands {
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
            other => return Err(Error::not_supported(FAMILY, other)),
        };
        Ok(command)
    }
}
