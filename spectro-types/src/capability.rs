//! Hardware capability descriptors
//!
//! Closed enumerations for the configuration options an instrument can
//! expose. Wire codes are deliberately absent here: every vendor family
//! keeps its own exhaustive code table next to its decoder.

use std::fmt;

use bitflags::bitflags;

/// Measurement port size
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Aperture {
    /// Large area view (LAV)
    Large,
    /// Medium area view (MAV)
    Medium,
    /// Small area view (SAV)
    Small,
    /// Ultra small area view (USAV)
    UltraSmall,
}

impl Aperture {
    pub const ALL: [Aperture; 4] = [Self::Large, Self::Medium, Self::Small, Self::UltraSmall];

    pub fn name(self) -> &'static str {
        match self {
            Self::Large => "LAV",
            Self::Medium => "MAV",
            Self::Small => "SAV",
            Self::UltraSmall => "USAV",
        }
    }

    /// Lens position matching this aperture on instruments that pair them
    pub fn paired_lens(self) -> LensPosition {
        match self {
            Self::Large => LensPosition::LargeArea,
            Self::Medium => LensPosition::MediumArea,
            Self::Small => LensPosition::SmallArea,
            Self::UltraSmall => LensPosition::UltraSmallArea,
        }
    }
}

impl fmt::Display for Aperture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optical filter placed in the illumination path
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LightFilter {
    #[default]
    NoFilter,
    /// UV cut-off at 400 nm
    UvCut400,
    /// UV cut-off at 420 nm
    UvCut420,
    /// UV cut-off at 460 nm
    UvCut460,
    /// UV content adjusted to a reference illuminant
    UvAdjusted,
}

impl LightFilter {
    pub const ALL: [LightFilter; 5] = [
        Self::NoFilter,
        Self::UvCut400,
        Self::UvCut420,
        Self::UvCut460,
        Self::UvAdjusted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NoFilter => "No filter",
            Self::UvCut400 => "UV cut 400nm",
            Self::UvCut420 => "UV cut 420nm",
            Self::UvCut460 => "UV cut 460nm",
            Self::UvAdjusted => "UV adjusted",
        }
    }
}

impl fmt::Display for LightFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lens position (area view) paired with the aperture plate
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LensPosition {
    LargeArea,
    MediumArea,
    SmallArea,
    UltraSmallArea,
}

impl LensPosition {
    pub const ALL: [LensPosition; 4] = [
        Self::LargeArea,
        Self::MediumArea,
        Self::SmallArea,
        Self::UltraSmallArea,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LargeArea => "Large area",
            Self::MediumArea => "Medium area",
            Self::SmallArea => "Small area",
            Self::UltraSmallArea => "Ultra small area",
        }
    }
}

impl fmt::Display for LensPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the gloss component is part of the measurement
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Specular {
    /// Specular component included (SCI)
    #[default]
    Included,
    /// Specular component excluded (SCE)
    Excluded,
}

impl fmt::Display for Specular {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Included => f.write_str("SCI"),
            Self::Excluded => f.write_str("SCE"),
        }
    }
}

/// A single calibration step
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CalibrationStep {
    /// Zero / black trap calibration
    Black,
    /// White tile calibration
    White,
    /// Green tile verification
    Green,
}

impl fmt::Display for CalibrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Black => f.write_str("black"),
            Self::White => f.write_str("white"),
            Self::Green => f.write_str("green"),
        }
    }
}

bitflags! {
    /// What an instrument is able to do
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const REFLECTANCE = 1;
        const TRANSMITTANCE = 1 << 1;
        const SPECULAR_INCLUDED = 1 << 2;
        const SPECULAR_EXCLUDED = 1 << 3;
        const OFFLINE_SAMPLES = 1 << 4;
        const OFFLINE_STANDARDS = 1 << 5;
    }
}

bitflags! {
    /// Settings a user interface may offer for adjustment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UiControls: u32 {
        const APERTURE = 1;
        const FILTER = 1 << 1;
        const LENS_POSITION = 1 << 2;
        const SPECULAR = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aperture_pairing() {
        for aperture in Aperture::ALL {
            let lens = aperture.paired_lens();
            assert_eq!(
                Aperture::ALL.iter().position(|a| *a == aperture),
                LensPosition::ALL.iter().position(|l| *l == lens)
            );
        }
    }

    #[test]
    fn test_capability_flags() {
        let caps = Capabilities::REFLECTANCE | Capabilities::OFFLINE_SAMPLES;
        assert!(caps.contains(Capabilities::REFLECTANCE));
        assert!(!caps.contains(Capabilities::OFFLINE_STANDARDS));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Aperture::Small.to_string(), "SAV");
        assert_eq!(Specular::Excluded.to_string(), "SCE");
        assert_eq!(LightFilter::default(), LightFilter::NoFilter);
    }
}
