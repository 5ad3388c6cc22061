//! Driver capability contract
//!
//! A [`SpectroDriver`] describes one instrument type ([`DriverInfo`]) and
//! creates sessions for it. Every driver in this crate follows the same
//! session policy: one live session per driver. Repeated calls to
//! [`create_spectrophotometer`](SpectroDriver::create_spectrophotometer)
//! return that session until it is disposed, after which a fresh one is
//! created.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use spectro_core::CommandSet;
use spectro_types::{CalibrationStep, DriverInfo, OperationalStatus};
use tracing::{debug, info, warn};

use crate::channel::CommandChannel;
use crate::config::DriverConfig;
use crate::error::Result;
use crate::spectrophotometer::Spectrophotometer;

/// Instrument type: fixed capabilities plus a session factory
#[async_trait]
pub trait SpectroDriver: Send + Sync {
    /// Fixed capability descriptor
    fn info(&self) -> &DriverInfo;

    /// Registry name
    fn name(&self) -> &str {
        &self.info().name
    }

    /// Driver-level setup, run once by the registry before publication
    async fn initialize(&self) -> Result<()>;

    /// Release everything the driver holds, its live session included
    async fn dispose(&self);

    /// Get the driver's session, creating it when none is live
    fn create_spectrophotometer(&self) -> Result<Arc<Spectrophotometer>>;

    fn supports_offline(&self) -> bool {
        self.info().supports_offline_samples() || self.info().supports_offline_standards()
    }

    /// Calibration steps in the order they must be performed
    fn calibration_steps(&self) -> &[CalibrationStep] {
        &self.info().calibration_steps
    }
}

/// Holder for a driver's single live session
#[derive(Default)]
pub struct SessionSlot {
    slot: Mutex<Option<Arc<Spectrophotometer>>>,
}

impl SessionSlot {
    /// Return the live session, or store and return a new one
    pub fn get_or_create(&self, create: impl FnOnce() -> Spectrophotometer) -> Arc<Spectrophotometer> {
        let mut slot = self.slot.lock();

        if let Some(live) = slot.as_ref() {
            if live.operational_status() != OperationalStatus::Disposed {
                return Arc::clone(live);
            }
            debug!(driver = live.driver_name(), "Replacing disposed session");
        }

        let session = Arc::new(create());
        *slot = Some(Arc::clone(&session));
        session
    }

    /// Dispose and forget the live session, if any
    pub async fn dispose(&self) {
        let live = self.slot.lock().take();

        if let Some(session) = live {
            if let Err(e) = session.dispose().await {
                warn!(driver = session.driver_name(), error = %e, "Session did not close cleanly");
            }
        }
    }
}

/// Driver speaking a vendor wire family over a configured endpoint
pub struct WireDriver {
    info: Arc<DriverInfo>,
    commands: Arc<dyn CommandSet>,
    config: DriverConfig,
    sessions: SessionSlot,
}

impl WireDriver {
    pub fn new(info: DriverInfo, commands: Arc<dyn CommandSet>, config: DriverConfig) -> Self {
        Self {
            info: Arc::new(info),
            commands,
            config,
            sessions: SessionSlot::default(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

#[async_trait]
impl SpectroDriver for WireDriver {
    fn info(&self) -> &DriverInfo {
        &self.info
    }

    async fn initialize(&self) -> Result<()> {
        self.info.validate()?;
        info!(
            driver = %self.info.name,
            family = self.commands.family(),
            endpoint = ?self.config.endpoint,
            "Driver initialized"
        );
        Ok(())
    }

    async fn dispose(&self) {
        debug!(driver = %self.info.name, "Disposing driver");
        self.sessions.dispose().await;
    }

    fn create_spectrophotometer(&self) -> Result<Arc<Spectrophotometer>> {
        Ok(self.sessions.get_or_create(|| {
            let transport = self.config.endpoint.open(self.config.session.timeout);
            let channel = CommandChannel::new(transport, Arc::clone(&self.commands));
            Spectrophotometer::new(
                Arc::clone(&self.info),
                Box::new(channel),
                self.config.session.clone(),
            )
        }))
    }
}
