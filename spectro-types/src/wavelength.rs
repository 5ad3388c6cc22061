//! Sampled wavelength ranges

use std::fmt;

use crate::error::{Error, Result};

/// Evenly spaced wavelength sampling, both ends inclusive, in nanometres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WavelengthRange {
    start_nm: u32,
    end_nm: u32,
    interval_nm: u32,
}

impl WavelengthRange {
    /// Create a validated range
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the range is empty, the interval is
    /// zero or the span is not a whole multiple of the interval.
    ///
    /// # Examples
    ///
    /// ```
    /// use spectro_types::WavelengthRange;
    ///
    /// let range = WavelengthRange::new(400, 700, 10).unwrap();
    /// assert_eq!(range.count(), 31);
    /// assert_eq!(range.wavelength(30), Some(700));
    /// ```
    pub fn new(start_nm: u32, end_nm: u32, interval_nm: u32) -> Result<Self> {
        if interval_nm == 0 {
            return Err(Error::Validation("wavelength interval must be positive".into()));
        }
        if start_nm >= end_nm {
            return Err(Error::Validation(format!(
                "wavelength range {}..{} is empty",
                start_nm, end_nm
            )));
        }
        if (end_nm - start_nm) % interval_nm != 0 {
            return Err(Error::Validation(format!(
                "range {}..{} is not a multiple of {} nm",
                start_nm, end_nm, interval_nm
            )));
        }

        Ok(Self {
            start_nm,
            end_nm,
            interval_nm,
        })
    }

    /// Range built from compile-time constants
    ///
    /// Not validated here; [`crate::DriverInfo::validate`] re-checks it.
    pub const fn fixed(start_nm: u32, end_nm: u32, interval_nm: u32) -> Self {
        Self {
            start_nm,
            end_nm,
            interval_nm,
        }
    }

    pub fn start_nm(&self) -> u32 {
        self.start_nm
    }

    pub fn end_nm(&self) -> u32 {
        self.end_nm
    }

    pub fn interval_nm(&self) -> u32 {
        self.interval_nm
    }

    /// Number of samples in the range
    pub fn count(&self) -> usize {
        (self.end_nm.saturating_sub(self.start_nm) / self.interval_nm.max(1)) as usize + 1
    }

    /// Wavelength of the sample at `index`
    pub fn wavelength(&self, index: usize) -> Option<u32> {
        if index < self.count() {
            Some(self.start_nm + self.interval_nm.max(1) * index as u32)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (self.start_nm..=self.end_nm).step_by(self.interval_nm.max(1) as usize)
    }
}

impl fmt::Display for WavelengthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}nm @{}nm",
            self.start_nm, self.end_nm, self.interval_nm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_count() {
        assert_eq!(WavelengthRange::new(360, 750, 10).unwrap().count(), 40);
        assert_eq!(WavelengthRange::new(380, 730, 10).unwrap().count(), 36);
    }

    #[test]
    fn test_range_iter_matches_index() {
        let range = WavelengthRange::new(400, 700, 10).unwrap();
        for (i, nm) in range.iter().enumerate() {
            assert_eq!(range.wavelength(i), Some(nm));
        }
        assert_eq!(range.wavelength(31), None);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(WavelengthRange::new(700, 400, 10).is_err());
        assert!(WavelengthRange::new(400, 700, 0).is_err());
        assert!(WavelengthRange::new(400, 705, 10).is_err());
    }
}
