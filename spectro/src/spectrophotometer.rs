//! Spectrophotometer session
//!
//! A [`Spectrophotometer`] is one live connection to one instrument. Every
//! operation is a single request/response exchange guarded by the session
//! state machine: a second operation issued while one is in flight fails
//! immediately with [`Error::Busy`] instead of queueing.

use std::sync::Arc;

use parking_lot::RwLock;
use spectro_core::{Operation, StateMachine};
use spectro_types::{
    CalibrationStep, DriverInfo, OperationalStatus, SpectroEvent, SpectroSettings, SpectroStatus,
    StatusMessage,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::listener::{Listeners, SpectroListener};

/// Session with one instrument
///
/// All methods take `&self`; share the session through the `Arc` returned by
/// [`SpectroDriver::create_spectrophotometer`](crate::SpectroDriver::create_spectrophotometer).
///
/// # Examples
///
/// ```
/// use spectro::{builtin, DriverConfig, SpectroDriver};
/// use spectro_transport::MockTransport;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let script = MockTransport::new();
/// script.push_reply(b"OK00\r\n");
///
/// let driver = builtin::minolta_cm2600d(DriverConfig::mock(script));
/// let spectro = driver.create_spectrophotometer()?;
///
/// spectro.initialize().await?;
/// let event = spectro.calibrate(spectro_types::CalibrationStep::Black).await?;
/// assert!(event.is_success());
/// spectro.dispose().await?;
/// # Ok::<(), spectro::Error>(())
/// # }).unwrap();
/// ```
pub struct Spectrophotometer {
    info: Arc<DriverInfo>,
    state: StateMachine,
    channel: Mutex<Box<dyn Channel>>,
    settings: RwLock<SpectroSettings>,
    listeners: Listeners,
    config: SessionConfig,
}

impl Spectrophotometer {
    /// Create an uninitialized session over `channel`
    pub fn new(info: Arc<DriverInfo>, channel: Box<dyn Channel>, config: SessionConfig) -> Self {
        Self {
            info,
            state: StateMachine::new(),
            channel: Mutex::new(channel),
            settings: RwLock::new(SpectroSettings::default()),
            listeners: Listeners::default(),
            config,
        }
    }

    /// Name of the driver that created this session
    pub fn driver_name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &DriverInfo {
        &self.info
    }

    pub fn operational_status(&self) -> OperationalStatus {
        self.state.state()
    }

    /// Current settings snapshot
    pub fn settings(&self) -> SpectroSettings {
        self.settings.read().clone()
    }

    /// Replace the settings snapshot without talking to the instrument
    ///
    /// Use [`apply_settings`](Self::apply_settings) to write them.
    pub fn set_settings(&self, settings: SpectroSettings) {
        *self.settings.write() = settings;
    }

    pub fn add_listener(&self, listener: Arc<dyn SpectroListener>) {
        self.listeners.add(listener);
    }

    /// Remove a listener, returning whether it was registered
    pub fn remove_listener(&self, listener: &Arc<dyn SpectroListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Open the channel and make the session ready
    ///
    /// Allowed from `Unknown` and from `Disposed`. On failure the channel is
    /// closed again and the session returns to `Unknown`.
    ///
    /// # Errors
    ///
    /// Returns the channel's error, or [`Error::InvalidResponse`] when the
    /// initial status query reports a failure.
    pub async fn initialize(&self) -> Result<()> {
        self.state.begin_initialize()?;
        self.notify_state(OperationalStatus::Initializing);
        let _rest = AtRest::new(self, Spectrophotometer::abandon_initialize);

        info!(driver = self.driver_name(), "Initializing session");

        let mut channel = self.channel.lock().await;
        let result = self.open_channel(&mut **channel).await;

        match result {
            Ok(settings_event) => {
                let state = self.state.finish_initialize(true)?;
                self.notify_state(state);

                if let Some(event) = settings_event {
                    self.listeners.dispatch("settings_changed", |l| l.settings_changed(&event));
                }

                info!(driver = self.driver_name(), via = %channel.describe(), "Session ready");
                Ok(())
            }
            Err(e) => {
                warn!(driver = self.driver_name(), error = %e, "Initialization failed");

                if let Err(close) = channel.close().await {
                    debug!(error = %close, "Closing after failed initialization");
                }
                let state = self.state.finish_initialize(false)?;
                self.notify_state(state);
                Err(e)
            }
        }
    }

    async fn open_channel(&self, channel: &mut dyn Channel) -> Result<Option<SpectroEvent>> {
        channel.open().await?;

        if !self.config.query_status_on_init || !channel.supports(Operation::QueryStatus) {
            return Ok(None);
        }

        let settings = self.settings();
        let event = channel
            .execute(Operation::QueryStatus, &settings, self.config.timeout, &|| {})
            .await?;

        if event.is_failure() {
            return Err(Error::InvalidResponse(format!(
                "status query failed: {}",
                event.spectro_status()
            )));
        }

        self.adopt_settings(&event);
        Ok(Some(event))
    }

    /// Close the channel; the session accepts no operation until it is
    /// initialized again
    ///
    /// Disposing twice is a no-op.
    pub async fn dispose(&self) -> Result<()> {
        if self.state.dispose() == OperationalStatus::Disposed {
            return Ok(());
        }
        self.notify_state(OperationalStatus::Disposed);

        info!(driver = self.driver_name(), "Disposing session");

        // Waits for an in-flight exchange to finish with the channel
        self.channel.lock().await.close().await
    }

    /// Take a measurement
    pub async fn measure(&self) -> Result<SpectroEvent> {
        self.run(Operation::Measure).await
    }

    /// Perform one calibration step
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] when the driver does not list `step`.
    pub async fn calibrate(&self, step: CalibrationStep) -> Result<SpectroEvent> {
        self.run(Operation::Calibrate(step)).await
    }

    /// Perform every calibration step of the driver, in order
    ///
    /// Stops after the first step whose event reports a failure. The
    /// returned events are in execution order.
    pub async fn calibrate_all(&self) -> Result<Vec<SpectroEvent>> {
        let mut events = Vec::with_capacity(self.info.calibration_steps.len());

        for step in self.info.calibration_steps.clone() {
            let event = self.calibrate(step).await?;
            let failed = event.is_failure();
            events.push(event);

            if failed {
                warn!(%step, "Calibration sequence stopped");
                break;
            }
        }

        Ok(events)
    }

    /// Read the instrument's current settings
    pub async fn query_status(&self) -> Result<SpectroEvent> {
        self.run(Operation::QueryStatus).await
    }

    pub async fn identify(&self) -> Result<SpectroEvent> {
        self.run(Operation::Identify).await
    }

    /// Write the settings snapshot to the instrument
    pub async fn apply_settings(&self) -> Result<SpectroEvent> {
        self.run(Operation::ApplySettings).await
    }

    pub async fn query_no_of_stored_samples(&self) -> Result<SpectroEvent> {
        self.run(Operation::QueryStoredSamples).await
    }

    /// Retrieve a stored sample by 1-based position
    pub async fn retrieve_stored_sample(&self, position: u32) -> Result<SpectroEvent> {
        self.run(Operation::RetrieveSample(position)).await
    }

    pub async fn query_no_of_standards(&self) -> Result<SpectroEvent> {
        self.run(Operation::QueryStandards).await
    }

    /// Retrieve a stored standard by 1-based position
    pub async fn retrieve_standard(&self, position: u32) -> Result<SpectroEvent> {
        self.run(Operation::RetrieveStandard(position)).await
    }

    /// Reject operations the driver does not advertise, before any I/O
    fn check_capabilities(&self, operation: Operation, settings: &SpectroSettings) -> Result<()> {
        let unsupported = || Error::NotSupported(format!("{} on {}", operation, self.info.name));

        match operation {
            Operation::Calibrate(step) if !self.info.supports_calibration(step) => {
                return Err(unsupported());
            }
            Operation::QueryStoredSamples | Operation::RetrieveSample(_)
                if !self.info.supports_offline_samples() =>
            {
                return Err(unsupported());
            }
            Operation::QueryStandards | Operation::RetrieveStandard(_)
                if !self.info.supports_offline_standards() =>
            {
                return Err(unsupported());
            }
            _ => {}
        }

        let capacity = match operation {
            Operation::RetrieveSample(position) => Some((position, self.info.offline.max_samples)),
            Operation::RetrieveStandard(position) => Some((position, self.info.offline.max_standards)),
            _ => None,
        };
        if let Some((position, max)) = capacity {
            if position == 0 || position > max {
                return Err(Error::InvalidParameter(format!(
                    "position {} outside 1..={}",
                    position, max
                )));
            }
        }

        if operation == Operation::ApplySettings {
            if let Some(aperture) = settings.aperture() {
                if !self.info.apertures.is_empty() && !self.info.apertures.contains(&aperture) {
                    return Err(Error::InvalidParameter(format!(
                        "aperture {} not offered by {}",
                        aperture, self.info.name
                    )));
                }
            }
            if !self.info.filters.contains(&settings.light_filter()) {
                return Err(Error::InvalidParameter(format!(
                    "filter {} not offered by {}",
                    settings.light_filter(),
                    self.info.name
                )));
            }
        }

        Ok(())
    }

    async fn run(&self, operation: Operation) -> Result<SpectroEvent> {
        let settings = self.settings();
        self.check_capabilities(operation, &settings)?;

        self.state.begin_operation()?;
        let rest = AtRest::new(self, Spectrophotometer::finish);

        let mut channel = self.channel.lock().await;
        if !channel.supports(operation) {
            return Err(Error::NotSupported(format!("{} on {}", operation, channel.describe())));
        }

        self.notify_state(OperationalStatus::Sending);
        debug!(driver = self.driver_name(), %operation, "Dispatching");

        let on_sent = || {
            if self.state.mark_receiving().is_ok() {
                self.notify_state(OperationalStatus::Receiving);
            }
        };

        let outcome = channel
            .execute(operation, &settings, self.config.timeout, &on_sent)
            .await;
        drop(channel);

        let (event, error) = match outcome {
            Ok(event) => (event, None),
            Err(Error::Transport(e)) if e.is_timeout() => {
                warn!(%operation, timeout = ?self.config.timeout, "Exchange timed out");
                (
                    SpectroEvent::status(operation.name(), SpectroStatus::failure(StatusMessage::Timeout)),
                    None,
                )
            }
            Err(e @ (Error::Transport(_) | Error::Native(_))) => {
                warn!(%operation, error = %e, "Exchange failed");
                let status = SpectroStatus::failure(StatusMessage::Communication(e.to_string()));
                (SpectroEvent::status(operation.name(), status), Some(e))
            }
            Err(e) => return Err(e),
        };

        drop(rest);

        if matches!(operation, Operation::QueryStatus | Operation::ApplySettings) {
            self.adopt_settings(&event);
        }
        self.deliver(operation, &event);

        match error {
            Some(e) => Err(e),
            None => Ok(event),
        }
    }

    fn finish(&self) {
        let state = self.state.finish_operation();
        self.notify_state(state);
    }

    fn abandon_initialize(&self) {
        if self.state.state() == OperationalStatus::Initializing
            && self.state.finish_initialize(false).is_ok()
        {
            self.notify_state(OperationalStatus::Unknown);
        }
    }

    /// Replace the snapshot with settings reported by a successful event
    fn adopt_settings(&self, event: &SpectroEvent) {
        if !event.is_success() {
            return;
        }
        if let Some(reported) = event.settings_payload() {
            let mut settings = self.settings.write();
            let mut merged = reported.clone();
            if let Some(location) = settings.location() {
                merged = merged.with_location(location);
            }
            *settings = merged;
        }
    }

    fn deliver(&self, operation: Operation, event: &SpectroEvent) {
        match operation {
            Operation::Measure => self.listeners.dispatch("measured", |l| l.measured(event)),
            Operation::Calibrate(_) => self.listeners.dispatch("calibrated", |l| l.calibrated(event)),
            Operation::QueryStatus | Operation::ApplySettings => {
                self.listeners.dispatch("settings_changed", |l| l.settings_changed(event))
            }
            Operation::QueryStoredSamples => {
                self.listeners.dispatch("number_samples_found", |l| l.number_samples_found(event))
            }
            Operation::RetrieveSample(_) => {
                self.listeners.dispatch("retrieved_sample", |l| l.retrieved_sample(event))
            }
            Operation::QueryStandards => {
                self.listeners.dispatch("number_standards_found", |l| l.number_standards_found(event))
            }
            Operation::RetrieveStandard(_) => {
                self.listeners.dispatch("retrieved_standard", |l| l.retrieved_standard(event))
            }
            Operation::Identify => {}
        }
    }

    fn notify_state(&self, status: OperationalStatus) {
        self.listeners
            .dispatch("operational_status_changed", |l| l.operational_status_changed(status));
    }
}

/// Runs `rest` when dropped, so a call that returns early, fails or is
/// cancelled mid-exchange never leaves the state machine mid-transition
struct AtRest<'a> {
    session: &'a Spectrophotometer,
    rest: fn(&Spectrophotometer),
}

impl<'a> AtRest<'a> {
    fn new(session: &'a Spectrophotometer, rest: fn(&Spectrophotometer)) -> Self {
        Self { session, rest }
    }
}

impl Drop for AtRest<'_> {
    fn drop(&mut self) {
        (self.rest)(self.session);
    }
}

impl std::fmt::Debug for Spectrophotometer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrophotometer")
            .field("driver", &self.info.name)
            .field("state", &self.state.state())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
