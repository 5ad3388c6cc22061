//! # spectro-core
//!
//! Protocol core for spectrophotometer drivers.
//!
//! This crate provides the instrument-independent protocol primitives:
//! - The [`SpectroCommand`] / [`CommandSet`] contract every vendor family implements
//! - The logical [`Operation`] vocabulary a session can request
//! - The operational [`StateMachine`] of a session
//! - Tokenizing and hex-frame helpers shared by the decoders
//! - One module per vendor wire family under [`families`]

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod families;
pub mod frame;
pub mod session;
pub mod token;

pub use command::{CommandSet, Operation, SpectroCommand};
pub use error::{Error, Result};
pub use session::StateMachine;

/// Protocol framework version
pub const PROTOCOL_VERSION: &str = "1.0";
