//! # spectro
//!
//! Uniform driver framework for spectrophotometers.
//!
//! ## Features
//!
//! - Compile-time driver catalogue with an explicitly constructed registry
//! - One session contract for every instrument family
//! - Vendor replies decoded into a shared success/warning/error model
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use spectro::{DriverConfig, DriverManager, Endpoint};
//!
//! #[tokio::main]
//! async fn main() -> spectro::Result<()> {
//!     let manager = DriverManager::new();
//!     let config = DriverConfig::new(Endpoint::tcp("192.168.1.50"));
//!     let driver = manager.register_driver("xrite-ci7", config).await?;
//!
//!     let spectro = driver.create_spectrophotometer()?;
//!     spectro.initialize().await?;
//!     spectro.calibrate_all().await?;
//!
//!     let event = spectro.measure().await?;
//!     if let Some(reading) = event.reading_payload() {
//!         println!("{}", reading);
//!     }
//!
//!     spectro.dispose().await?;
//!     Ok(())
//! }
//! ```

pub mod builtin;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod listener;
pub mod native;
pub mod registry;
pub mod spectrophotometer;

// Re-exports
pub use channel::{Channel, CommandChannel};
pub use config::{DriverConfig, Endpoint, SessionConfig};
pub use driver::{SessionSlot, SpectroDriver, WireDriver};
pub use error::{DriverError, Error, Result};
pub use listener::SpectroListener;
pub use native::{NativeApi, NativeChannel, NativeDriver};
pub use registry::DriverManager;
pub use spectrophotometer::Spectrophotometer;

// Re-export types
pub use spectro_core::{CommandSet, Operation, SpectroCommand};
pub use spectro_types::{
    Aperture, CalibrationStep, DriverInfo, EventPayload, LightFilter, OperationalStatus,
    SpectroEvent, SpectroReading, SpectroSettings, SpectroStatus, StatusMessage,
};
