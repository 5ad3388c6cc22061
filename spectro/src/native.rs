//! Native (vendor library) instruments
//!
//! Some instruments are only reachable through a vendor SDK. [`NativeApi`]
//! is the seam such a binding implements; [`NativeChannel`] runs its
//! blocking calls off the async runtime and maps the SDK's integer result
//! codes onto the shared status vocabulary, so sessions and listeners see
//! the same events as for wire instruments.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use spectro_core::Operation;
use spectro_types::{
    CalibrationStep, DriverInfo, EventPayload, Severity, SpectroEvent, SpectroReading,
    SpectroSettings, SpectroStatus, StatusMessage, WavelengthRange,
};
use tracing::debug;

use crate::channel::{Channel, OnSent};
use crate::config::SessionConfig;
use crate::driver::{SessionSlot, SpectroDriver};
use crate::error::{Error, Result};
use crate::spectrophotometer::Spectrophotometer;

/// Wavelengths filled in by [`NativeApi::measure`]
pub const NATIVE_WAVELENGTHS: WavelengthRange = WavelengthRange::fixed(400, 700, 10);

/// Blocking vendor SDK binding
///
/// Methods return the SDK's integer result code. `measure` writes one
/// reflectance per wavelength of [`NATIVE_WAVELENGTHS`] into `out`.
#[cfg_attr(test, mockall::automock)]
pub trait NativeApi: Send + Sync {
    fn open(&self) -> i32;

    fn close(&self);

    fn calibrate(&self, step: CalibrationStep) -> i32;

    fn measure(&self, settings: &SpectroSettings, out: &mut [f64]) -> i32;

    fn identify(&self) -> String;
}

/// Translate an SDK result code into a status
pub fn native_status(code: i32) -> SpectroStatus {
    let (severity, message) = match code {
        0 => (Severity::Message, StatusMessage::Ok),
        1 => (Severity::Warning, StatusMessage::NotCalibrated),
        -1 => (Severity::Error, StatusMessage::ErrorDeviceNotFound),
        -2 => (Severity::Error, StatusMessage::ErrorCalibration),
        -3 => (Severity::Error, StatusMessage::ErrorMeasurement),
        _ => (Severity::Error, StatusMessage::UnknownStatus),
    };

    let mut status = SpectroStatus::new();
    status.push(severity, message);
    status
}

/// Channel calling a [`NativeApi`] on the blocking thread pool
///
/// SDK calls never overlap. A call abandoned by a timeout keeps running on
/// its thread and holds the gate until it returns; the next call waits for
/// it within its own timeout.
pub struct NativeChannel {
    api: Arc<dyn NativeApi>,
    gate: Arc<tokio::sync::Mutex<()>>,
    open: bool,
}

impl NativeChannel {
    pub fn new(api: Arc<dyn NativeApi>) -> Self {
        Self {
            api,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            open: false,
        }
    }

    async fn blocking<T, F>(&self, timeout: Duration, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn NativeApi) -> T + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let gate = Arc::clone(&self.gate);

        let task = async move {
            let permit = gate.lock_owned().await;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                call(api.as_ref())
            })
            .await
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join)) => Err(Error::Native(join.to_string())),
            Err(_) => Err(spectro_transport::Error::ReadTimeout.into()),
        }
    }
}

#[async_trait]
impl Channel for NativeChannel {
    async fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }

        let code = self.blocking(Duration::from_secs(30), |api| api.open()).await?;
        let status = native_status(code);
        if status.is_failure() {
            return Err(Error::Native(format!("open failed: {}", status)));
        }

        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.blocking(Duration::from_secs(30), |api| api.close()).await?;
        }
        Ok(())
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(
            operation,
            Operation::Measure | Operation::Calibrate(_) | Operation::Identify
        )
    }

    async fn execute(
        &mut self,
        operation: Operation,
        settings: &SpectroSettings,
        timeout: Duration,
        on_sent: OnSent<'_>,
    ) -> Result<SpectroEvent> {
        if !self.open {
            return Err(spectro_transport::Error::NotConnected.into());
        }

        debug!(%operation, "Native call");

        let event = match operation {
            Operation::Measure => {
                let snapshot = settings.clone();
                on_sent();
                let (code, samples) = self
                    .blocking(timeout, move |api| {
                        let mut out = vec![f64::NAN; NATIVE_WAVELENGTHS.count()];
                        let code = api.measure(&snapshot, &mut out);
                        (code, out)
                    })
                    .await?;

                let mut status = native_status(code);
                if status.is_failure() {
                    return Ok(SpectroEvent::status("native.measure", status));
                }

                let mut values = BTreeMap::new();
                for (wavelength, value) in NATIVE_WAVELENGTHS.iter().zip(samples) {
                    if value.is_finite() {
                        values.insert(wavelength, value);
                    } else {
                        status.add_warning(StatusMessage::InvalidValue {
                            wavelength,
                            token: value.to_string(),
                        });
                    }
                }

                SpectroEvent::reading(
                    "native.measure",
                    SpectroReading::new(status, settings.clone(), values),
                )
            }
            Operation::Calibrate(step) => {
                on_sent();
                let code = self.blocking(timeout, move |api| api.calibrate(step)).await?;

                let mut status = native_status(code);
                if status.is_success() {
                    status.add_message(StatusMessage::CalibrationDone);
                }
                SpectroEvent::status("native.calibrate", status)
            }
            Operation::Identify => {
                on_sent();
                let identity = self.blocking(timeout, |api| api.identify()).await?;

                if identity.trim().is_empty() {
                    SpectroEvent::status(
                        "native.identify",
                        SpectroStatus::failure(StatusMessage::InvalidReturn),
                    )
                } else {
                    let status = SpectroStatus::ok().with_message(StatusMessage::Identity(identity.clone()));
                    SpectroEvent::with_payload("native.identify", status, EventPayload::Identity(identity))
                }
            }
            other => {
                return Err(Error::NotSupported(format!("{} on native", other)));
            }
        };

        Ok(event)
    }

    fn describe(&self) -> String {
        "native".to_string()
    }
}

/// Driver for an instrument behind a [`NativeApi`]
///
/// Not part of the builtin catalogue; register it with
/// [`DriverManager::register_driver_instance`](crate::DriverManager::register_driver_instance).
pub struct NativeDriver {
    info: Arc<DriverInfo>,
    api: Arc<dyn NativeApi>,
    session: SessionConfig,
    sessions: SessionSlot,
}

impl NativeDriver {
    pub fn new(info: DriverInfo, api: Arc<dyn NativeApi>) -> Self {
        Self {
            info: Arc::new(info),
            api,
            session: SessionConfig::default(),
            sessions: SessionSlot::default(),
        }
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

#[async_trait]
impl SpectroDriver for NativeDriver {
    fn info(&self) -> &DriverInfo {
        &self.info
    }

    async fn initialize(&self) -> Result<()> {
        self.info.validate()?;
        Ok(())
    }

    async fn dispose(&self) {
        self.sessions.dispose().await;
    }

    fn create_spectrophotometer(&self) -> Result<Arc<Spectrophotometer>> {
        Ok(self.sessions.get_or_create(|| {
            Spectrophotometer::new(
                Arc::clone(&self.info),
                Box::new(NativeChannel::new(Arc::clone(&self.api))),
                self.session.clone(),
            )
        }))
    }
}
