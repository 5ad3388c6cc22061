//! Vendor wire families
//!
//! Each module owns the complete command vocabulary of one protocol family:
//! the outgoing byte layout, the response decoder and the fixed code tables
//! mapping vendor codes onto the shared [`spectro_types::StatusMessage`]
//! vocabulary.
//!
//! | Family | Wire format |
//! |---|---|
//! | [`gretag`] | single ASCII character commands, positional status bytes |
//! | [`minolta`] | `OKnn`/`ERnn` result codes with comma-delimited fields |
//! | [`datacolor`] | fixed-column status strings |
//! | [`xrite`] | multi-line replies with a fixed-width status line |
//! | [`techkon`] | hex-encoded binary frames with checksum |

pub mod datacolor;
pub mod gretag;
pub mod minolta;
pub mod techkon;
pub mod xrite;

pub use datacolor::DatacolorCommands;
pub use gretag::GretagCommands;
pub use minolta::MinoltaCommands;
pub use techkon::TechkonCommands;
pub use xrite::XriteCommands;
