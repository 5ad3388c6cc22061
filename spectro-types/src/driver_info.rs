//! Driver descriptor structures

use std::fmt;

use crate::capability::{Aperture, CalibrationStep, Capabilities, LensPosition, LightFilter, UiControls};
use crate::error::{Error, Result};
use crate::wavelength::WavelengthRange;

/// Offline storage capacity of an instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfflineStorage {
    /// Maximum number of stored samples (0 when unsupported)
    pub max_samples: u32,

    /// Maximum number of stored standards (0 when unsupported)
    pub max_standards: u32,
}

/// Fixed capability set of an instrument type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    /// Registry name
    pub name: String,

    /// Manufacturer
    pub manufacturer: String,

    /// Instrument model
    pub model: String,

    pub capabilities: Capabilities,

    /// Sampled wavelengths of a measurement
    pub wavelengths: WavelengthRange,

    pub apertures: Vec<Aperture>,

    pub filters: Vec<LightFilter>,

    pub lens_positions: Vec<LensPosition>,

    /// Calibration steps in the order they must be performed
    pub calibration_steps: Vec<CalibrationStep>,

    pub offline: OfflineStorage,

    /// Settings a user interface may expose
    pub ui: UiControls,
}

impl DriverInfo {
    pub fn new(
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        wavelengths: WavelengthRange,
    ) -> Self {
        Self {
            name: name.into(),
            manufacturer: manufacturer.into(),
            model: model.into(),
            capabilities: Capabilities::REFLECTANCE,
            wavelengths,
            apertures: Vec::new(),
            filters: vec![LightFilter::NoFilter],
            lens_positions: Vec::new(),
            calibration_steps: Vec::new(),
            offline: OfflineStorage::default(),
            ui: UiControls::empty(),
        }
    }

    pub fn can_calibrate(&self) -> bool {
        !self.calibration_steps.is_empty()
    }

    pub fn supports_calibration(&self, step: CalibrationStep) -> bool {
        self.calibration_steps.contains(&step)
    }

    pub fn supports_offline_samples(&self) -> bool {
        self.capabilities.contains(Capabilities::OFFLINE_SAMPLES)
    }

    pub fn supports_offline_standards(&self) -> bool {
        self.capabilities.contains(Capabilities::OFFLINE_STANDARDS)
    }

    /// Check the descriptor against the driver capability contract
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("driver name is empty".into()));
        }

        WavelengthRange::new(
            self.wavelengths.start_nm(),
            self.wavelengths.end_nm(),
            self.wavelengths.interval_nm(),
        )?;

        if !self
            .capabilities
            .intersects(Capabilities::REFLECTANCE | Capabilities::TRANSMITTANCE)
        {
            return Err(Error::Validation(format!(
                "driver {} measures neither reflectance nor transmittance",
                self.name
            )));
        }

        if self.supports_offline_samples() != (self.offline.max_samples > 0) {
            return Err(Error::Validation(format!(
                "driver {} offline sample flag disagrees with capacity {}",
                self.name, self.offline.max_samples
            )));
        }

        if self.supports_offline_standards() != (self.offline.max_standards > 0) {
            return Err(Error::Validation(format!(
                "driver {} offline standard flag disagrees with capacity {}",
                self.name, self.offline.max_standards
            )));
        }

        if self.ui.contains(UiControls::APERTURE) && self.apertures.is_empty() {
            return Err(Error::Validation(format!(
                "driver {} exposes aperture control without apertures",
                self.name
            )));
        }

        Ok(())
    }
}

impl fmt::Display for DriverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Driver[{}: {} {}, {}]",
            self.name, self.manufacturer, self.model, self.wavelengths
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DriverInfo {
        DriverInfo::new("test", "Acme", "X1", WavelengthRange::fixed(400, 700, 10))
    }

    #[test]
    fn test_valid_descriptor() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut info = sample();
        info.name = " ".into();
        assert!(info.validate().is_err());
    }

    #[test]
    fn test_offline_flags_must_match_capacity() {
        let mut info = sample();
        info.capabilities |= Capabilities::OFFLINE_SAMPLES;
        assert!(info.validate().is_err());

        info.offline.max_samples = 100;
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_bad_wavelengths_rejected() {
        let mut info = sample();
        info.wavelengths = WavelengthRange::fixed(700, 400, 10);
        assert!(matches!(info.validate(), Err(Error::Validation(_))));
    }
}
