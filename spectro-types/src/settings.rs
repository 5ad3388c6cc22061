//! Instrument settings snapshots

use std::collections::BTreeMap;
use std::fmt;

use crate::capability::{Aperture, LensPosition, LightFilter, Specular};

/// Immutable snapshot of the configuration applied to (or decoded from) an
/// instrument
///
/// Every `with_*` method returns a new value; an existing snapshot is never
/// modified, so a session can hand out clones freely.
///
/// # Examples
///
/// ```
/// use spectro_types::{Aperture, LightFilter, SpectroSettings, Specular};
///
/// let base = SpectroSettings::default();
/// let uv = base.clone().with_light_filter(LightFilter::UvCut400);
///
/// assert_eq!(base.light_filter(), LightFilter::NoFilter);
/// assert_eq!(uv.light_filter(), LightFilter::UvCut400);
/// assert_eq!(uv.specular(), Specular::Included);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpectroSettings {
    aperture: Option<Aperture>,
    light_filter: LightFilter,
    specular: Specular,
    lens_position: Option<LensPosition>,
    location: Option<String>,
    channel_parameters: BTreeMap<String, String>,
}

impl SpectroSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aperture(mut self, aperture: Aperture) -> Self {
        self.aperture = Some(aperture);
        self
    }

    pub fn with_light_filter(mut self, filter: LightFilter) -> Self {
        self.light_filter = filter;
        self
    }

    pub fn with_specular(mut self, specular: Specular) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_lens_position(mut self, lens: LensPosition) -> Self {
        self.lens_position = Some(lens);
        self
    }

    /// Free-form description of where on the sample the reading is taken
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Vendor-specific parameter, e.g. averaging count
    pub fn with_channel_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.channel_parameters.insert(key.into(), value.into());
        self
    }

    pub fn aperture(&self) -> Option<Aperture> {
        self.aperture
    }

    pub fn light_filter(&self) -> LightFilter {
        self.light_filter
    }

    pub fn specular(&self) -> Specular {
        self.specular
    }

    pub fn lens_position(&self) -> Option<LensPosition> {
        self.lens_position
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn channel_parameter(&self, key: &str) -> Option<&str> {
        self.channel_parameters.get(key).map(String::as_str)
    }

    pub fn channel_parameters(&self) -> &BTreeMap<String, String> {
        &self.channel_parameters
    }
}

impl fmt::Display for SpectroSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Settings[{}, {}", self.specular, self.light_filter)?;
        if let Some(aperture) = self.aperture {
            write!(f, ", aperture={}", aperture)?;
        }
        if let Some(lens) = self.lens_position {
            write!(f, ", lens={}", lens)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_settings_builder_is_non_destructive() {
        let original = SpectroSettings::new().with_aperture(Aperture::Small);
        let changed = original.clone().with_aperture(Aperture::Large);

        assert_eq!(original.aperture(), Some(Aperture::Small));
        assert_eq!(changed.aperture(), Some(Aperture::Large));
    }

    #[test]
    fn test_channel_parameters() {
        let settings = SpectroSettings::new()
            .with_channel_parameter("auto_average", "3")
            .with_location("left edge");

        assert_eq!(settings.channel_parameter("auto_average"), Some("3"));
        assert_eq!(settings.channel_parameter("missing"), None);
        assert_eq!(settings.location(), Some("left edge"));
    }

    #[test]
    fn test_settings_display() {
        let settings = SpectroSettings::new()
            .with_specular(Specular::Excluded)
            .with_aperture(Aperture::Medium);
        assert_eq!(settings.to_string(), "Settings[SCE, No filter, aperture=MAV]");
    }
}
