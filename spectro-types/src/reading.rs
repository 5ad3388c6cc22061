//! Measurement payload

use std::collections::BTreeMap;
use std::fmt;

use crate::settings::SpectroSettings;
use crate::status::SpectroStatus;

/// Spectral reading returned by a measurement or an offline retrieval
///
/// Values are keyed by wavelength in nanometres and already normalized to
/// the 0..1 reflectance scale. The map keeps keys unique and ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectroReading {
    status: SpectroStatus,
    settings: SpectroSettings,
    values: BTreeMap<u32, f64>,
}

impl SpectroReading {
    pub fn new(status: SpectroStatus, settings: SpectroSettings, values: BTreeMap<u32, f64>) -> Self {
        Self {
            status,
            settings,
            values,
        }
    }

    pub fn status(&self) -> &SpectroStatus {
        &self.status
    }

    /// Settings in effect when the reading was taken
    pub fn settings(&self) -> &SpectroSettings {
        &self.settings
    }

    pub fn values(&self) -> &BTreeMap<u32, f64> {
        &self.values
    }

    pub fn value_at(&self, wavelength_nm: u32) -> Option<f64> {
        self.values.get(&wavelength_nm).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lowest and highest wavelength present
    pub fn span(&self) -> Option<(u32, u32)> {
        let first = self.values.keys().next()?;
        let last = self.values.keys().next_back()?;
        Some((*first, *last))
    }
}

impl fmt::Display for SpectroReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span() {
            Some((first, last)) => write!(
                f,
                "Reading[{} values, {}-{}nm, {}]",
                self.values.len(),
                first,
                last,
                self.status
            ),
            None => write!(f, "Reading[empty, {}]", self.status),
        }
    }
}
