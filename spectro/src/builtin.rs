//! Builtin driver catalogue
//!
//! One entry per supported instrument model. Each entry pairs a fixed
//! [`DriverInfo`] with the wire family that model speaks; the registry
//! instantiates entries by id through [`lookup`].

use std::sync::Arc;

use spectro_core::families::{
    datacolor, gretag, minolta, techkon, xrite, DatacolorCommands, GretagCommands,
    MinoltaCommands, TechkonCommands, XriteCommands,
};
use spectro_types::{
    Aperture, CalibrationStep, Capabilities, DriverInfo, LensPosition, LightFilter,
    OfflineStorage, UiControls,
};

use crate::config::DriverConfig;
use crate::driver::{SpectroDriver, WireDriver};

/// Builds a driver from its connection settings
pub type DriverFactory = fn(DriverConfig) -> Box<dyn SpectroDriver>;

/// Every builtin driver id with its factory
pub const CATALOGUE: &[(&str, DriverFactory)] = &[
    ("gretag-spm", gretag_spm),
    ("minolta-cm2600d", minolta_cm2600d),
    ("datacolor-600", datacolor_600),
    ("xrite-ci7", xrite_ci7),
    ("techkon-sp820", techkon_sp820),
];

/// Find the factory registered under `id`
pub fn lookup(id: &str) -> Option<DriverFactory> {
    CATALOGUE
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, factory)| *factory)
}

/// Ids of every builtin driver, in catalogue order
pub fn ids() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|(name, _)| *name)
}

const BOTH_SPECULAR: Capabilities = Capabilities::SPECULAR_INCLUDED.union(Capabilities::SPECULAR_EXCLUDED);

pub fn gretag_spm_info() -> DriverInfo {
    let mut info = DriverInfo::new("gretag-spm", "GretagMacbeth", "SPM", gretag::WAVELENGTHS);
    info.capabilities |= BOTH_SPECULAR;
    info.apertures = vec![Aperture::Small, Aperture::Large];
    info.filters = vec![LightFilter::NoFilter, LightFilter::UvCut400];
    info.lens_positions = vec![LensPosition::SmallArea, LensPosition::LargeArea];
    info.calibration_steps = vec![CalibrationStep::White];
    info
}

pub fn gretag_spm(config: DriverConfig) -> Box<dyn SpectroDriver> {
    Box::new(WireDriver::new(gretag_spm_info(), Arc::new(GretagCommands), config))
}

pub fn minolta_cm2600d_info() -> DriverInfo {
    let mut info = DriverInfo::new("minolta-cm2600d", "Konica Minolta", "CM-2600d", minolta::WAVELENGTHS);
    info.capabilities |= BOTH_SPECULAR | Capabilities::OFFLINE_SAMPLES | Capabilities::OFFLINE_STANDARDS;
    info.apertures = vec![Aperture::Medium, Aperture::Small];
    info.filters = vec![LightFilter::NoFilter, LightFilter::UvCut400, LightFilter::UvAdjusted];
    info.lens_positions = vec![LensPosition::MediumArea, LensPosition::SmallArea];
    info.calibration_steps = vec![CalibrationStep::Black, CalibrationStep::White];
    info.offline = OfflineStorage {
        max_samples: minolta::MAX_SAMPLES,
        max_standards: minolta::MAX_STANDARDS,
    };
    info.ui = UiControls::APERTURE | UiControls::FILTER | UiControls::LENS_POSITION | UiControls::SPECULAR;
    info
}

pub fn minolta_cm2600d(config: DriverConfig) -> Box<dyn SpectroDriver> {
    Box::new(WireDriver::new(minolta_cm2600d_info(), Arc::new(MinoltaCommands), config))
}

pub fn datacolor_600_info() -> DriverInfo {
    let mut info = DriverInfo::new("datacolor-600", "Datacolor", "SF600", datacolor::WAVELENGTHS);
    info.capabilities |= BOTH_SPECULAR;
    info.apertures = Aperture::ALL.to_vec();
    info.filters = vec![
        LightFilter::NoFilter,
        LightFilter::UvCut400,
        LightFilter::UvCut420,
        LightFilter::UvCut460,
    ];
    info.lens_positions = LensPosition::ALL.to_vec();
    info.calibration_steps = vec![CalibrationStep::Black, CalibrationStep::White, CalibrationStep::Green];
    info.ui = UiControls::APERTURE | UiControls::FILTER | UiControls::LENS_POSITION | UiControls::SPECULAR;
    info
}

pub fn datacolor_600(config: DriverConfig) -> Box<dyn SpectroDriver> {
    Box::new(WireDriver::new(datacolor_600_info(), Arc::new(DatacolorCommands), config))
}

pub fn xrite_ci7_info() -> DriverInfo {
    let mut info = DriverInfo::new("xrite-ci7", "X-Rite", "Ci7", xrite::WAVELENGTHS);
    info.capabilities |= BOTH_SPECULAR;
    info.apertures = Aperture::ALL.to_vec();
    info.filters = vec![
        LightFilter::NoFilter,
        LightFilter::UvCut400,
        LightFilter::UvCut420,
        LightFilter::UvCut460,
    ];
    info.lens_positions = LensPosition::ALL.to_vec();
    info.calibration_steps = vec![CalibrationStep::Black, CalibrationStep::White];
    info.ui = UiControls::APERTURE | UiControls::FILTER | UiControls::LENS_POSITION | UiControls::SPECULAR;
    info
}

pub fn xrite_ci7(config: DriverConfig) -> Box<dyn SpectroDriver> {
    Box::new(WireDriver::new(xrite_ci7_info(), Arc::new(XriteCommands), config))
}

pub fn techkon_sp820_info() -> DriverInfo {
    let mut info = DriverInfo::new("techkon-sp820", "Techkon", "SpectroDens SP820", techkon::WAVELENGTHS);
    info.capabilities |= BOTH_SPECULAR;
    info.apertures = vec![Aperture::Large, Aperture::Medium, Aperture::Small];
    info.filters = vec![LightFilter::NoFilter, LightFilter::UvCut400, LightFilter::UvAdjusted];
    info.lens_positions = vec![LensPosition::LargeArea, LensPosition::MediumArea, LensPosition::SmallArea];
    info.calibration_steps = vec![CalibrationStep::Black, CalibrationStep::White];
    info.ui = UiControls::APERTURE | UiControls::FILTER | UiControls::SPECULAR;
    info
}

pub fn techkon_sp820(config: DriverConfig) -> Box<dyn SpectroDriver> {
    Box::new(WireDriver::new(techkon_sp820_info(), Arc::new(TechkonCommands), config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_is_valid() {
        for (id, factory) in CATALOGUE {
            let driver = factory(DriverConfig::default());
            assert_eq!(driver.name(), *id);
            driver.info().validate().unwrap();
            assert!(driver.info().can_calibrate(), "{} cannot calibrate", id);
            assert!(driver.info().filters.contains(&LightFilter::NoFilter));
        }
    }

    #[test]
    fn test_measured_quantities_match_the_wire_families() {
        // No family has a transmittance mode to select
        for (id, factory) in CATALOGUE {
            let capabilities = factory(DriverConfig::default()).info().capabilities;
            assert!(capabilities.contains(Capabilities::REFLECTANCE), "{}", id);
            assert!(!capabilities.contains(Capabilities::TRANSMITTANCE), "{}", id);
        }
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("xrite-ci7").is_some());
        assert!(lookup("xrite").is_none());
        assert_eq!(ids().count(), CATALOGUE.len());
    }

    #[test]
    fn test_only_minolta_stores_offline() {
        let offline: Vec<_> = CATALOGUE
            .iter()
            .map(|(_, factory)| factory(DriverConfig::default()))
            .filter(|driver| driver.supports_offline())
            .map(|driver| driver.name().to_string())
            .collect();

        assert_eq!(offline, vec!["minolta-cm2600d".to_string()]);
    }
}
