//! Type definitions for spectro
//!
//! Value objects shared by every layer of the workspace:
//! - Capability descriptors (aperture, light filter, lens position, ...)
//! - Settings snapshots
//! - The status/reading/event model every vendor decoder produces
//! - Driver descriptors and the session's operational status

pub mod capability;
pub mod driver_info;
pub mod error;
pub mod event;
pub mod reading;
pub mod settings;
pub mod status;
pub mod wavelength;

pub use capability::{
    Aperture, CalibrationStep, Capabilities, LensPosition, LightFilter, Specular, UiControls,
};
pub use driver_info::{DriverInfo, OfflineStorage};
pub use error::{Error, Result};
pub use event::{EventPayload, OperationalStatus, SpectroEvent};
pub use reading::SpectroReading;
pub use settings::SpectroSettings;
pub use status::{Severity, SpectroStatus, StatusMessage};
pub use wavelength::WavelengthRange;
