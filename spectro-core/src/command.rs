//! Command/response contract implemented by every vendor family

use std::fmt;

use bytes::Bytes;
use spectro_types::{CalibrationStep, SpectroEvent, SpectroSettings};

use crate::constants::{CR, LF};
use crate::error::Result;

/// Logical operation a session can ask an instrument to perform
///
/// Families translate an operation into a concrete [`SpectroCommand`]
/// through their [`CommandSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Measure,
    Calibrate(CalibrationStep),
    QueryStatus,
    Identify,
    /// Write the session's settings to the instrument
    ApplySettings,
    QueryStoredSamples,
    /// Retrieve a stored sample (1-based position)
    RetrieveSample(u32),
    QueryStandards,
    /// Retrieve a stored standard (1-based position)
    RetrieveStandard(u32),
}

impl Operation {
    /// Get operation name
    pub fn name(self) -> &'static str {
        match self {
            Self::Measure => "measure",
            Self::Calibrate(_) => "calibrate",
            Self::QueryStatus => "query_status",
            Self::Identify => "identify",
            Self::ApplySettings => "apply_settings",
            Self::QueryStoredSamples => "query_stored_samples",
            Self::RetrieveSample(_) => "retrieve_sample",
            Self::QueryStandards => "query_standards",
            Self::RetrieveStandard(_) => "retrieve_standard",
        }
    }

    /// Check if this operation reads the instrument's offline memory
    pub fn is_offline(self) -> bool {
        matches!(
            self,
            Self::QueryStoredSamples
                | Self::RetrieveSample(_)
                | Self::QueryStandards
                | Self::RetrieveStandard(_)
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calibrate(step) => write!(f, "calibrate({})", step),
            Self::RetrieveSample(position) => write!(f, "retrieve_sample({})", position),
            Self::RetrieveStandard(position) => write!(f, "retrieve_standard({})", position),
            other => f.write_str(other.name()),
        }
    }
}

/// One protocol unit of a vendor family
///
/// `construct` is a pure function of the command's parameters. `interpret`
/// is a total decoder: whatever bytes arrive, it returns an event whose
/// status describes them. It never panics and never returns "no event".
pub trait SpectroCommand: Send + Sync + fmt::Debug {
    /// Command name, used as the event source
    fn name(&self) -> &'static str;

    /// Exact outgoing bytes
    fn construct(&self) -> Bytes;

    /// Decode a complete response
    fn interpret(&self, response: &[u8]) -> SpectroEvent;

    /// Check whether `response` holds a complete reply
    ///
    /// The default accepts any reply ending in CR or LF.
    fn is_complete(&self, response: &[u8]) -> bool {
        matches!(response.last(), Some(&CR) | Some(&LF))
    }
}

/// Factory for the commands of one vendor family
pub trait CommandSet: Send + Sync {
    /// Family name used in logs and errors
    fn family(&self) -> &'static str;

    /// Build the command for `operation`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotSupported`] when the family has no command
    /// for the operation and [`crate::Error::InvalidParameter`] when the
    /// settings or position cannot be encoded.
    fn command(
        &self,
        operation: Operation,
        settings: &SpectroSettings,
    ) -> Result<Box<dyn SpectroCommand>>;

    /// Check whether the family has a command for `operation` at all
    fn supports(&self, operation: Operation) -> bool {
        match self.command(operation, &SpectroSettings::default()) {
            Ok(_) => true,
            Err(crate::Error::NotSupported { .. }) => false,
            // Encodable in principle, the default settings were just not accepted
            Err(_) => true,
        }
    }
}
