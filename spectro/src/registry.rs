//! Driver registry
//!
//! [`DriverManager`] holds the installed drivers by name. It is an ordinary
//! value: construct one, wrap it in an `Arc` and hand it to whatever needs
//! lookups. Construction and initialization of a driver happen before the
//! write lock is taken, so readers only ever observe fully registered
//! drivers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::builtin;
use crate::config::DriverConfig;
use crate::driver::SpectroDriver;
use crate::error::{DriverError, Result};

/// Registry of installed drivers
#[derive(Default)]
pub struct DriverManager {
    drivers: RwLock<HashMap<String, Arc<dyn SpectroDriver>>>,
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate the builtin driver `id` and register it
    ///
    /// # Errors
    ///
    /// - [`DriverError::UnknownDriver`] when `id` is not in the catalogue
    /// - [`DriverError::InvalidDriver`] when its descriptor is inconsistent
    /// - [`DriverError::InitializationFailed`] when `initialize()` fails
    pub async fn register_driver(&self, id: &str, config: DriverConfig) -> Result<Arc<dyn SpectroDriver>> {
        let factory = builtin::lookup(id).ok_or_else(|| DriverError::UnknownDriver(id.to_string()))?;
        self.register_driver_instance(Arc::from(factory(config))).await
    }

    /// Register an already constructed driver under its reported name
    ///
    /// A driver previously registered under the same name is replaced and
    /// disposed.
    pub async fn register_driver_instance(
        &self,
        driver: Arc<dyn SpectroDriver>,
    ) -> Result<Arc<dyn SpectroDriver>> {
        let name = driver.name().to_string();

        driver.info().validate().map_err(|e| DriverError::InvalidDriver {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        driver
            .initialize()
            .await
            .map_err(|e| DriverError::InitializationFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let replaced = self.drivers.write().insert(name.clone(), Arc::clone(&driver));

        if let Some(old) = replaced {
            if !Arc::ptr_eq(&old, &driver) {
                debug!(driver = %name, "Disposing replaced driver");
                old.dispose().await;
            }
        }

        info!(driver = %name, model = %driver.info().model, "Driver registered");
        Ok(driver)
    }

    /// Remove and dispose the driver registered as `name`
    ///
    /// Returns whether a driver was removed.
    pub async fn unregister_driver(&self, name: &str) -> bool {
        let removed = self.drivers.write().remove(name);

        match removed {
            Some(driver) => {
                driver.dispose().await;
                info!(driver = %name, "Driver unregistered");
                true
            }
            None => false,
        }
    }

    pub fn get_driver(&self, name: &str) -> Option<Arc<dyn SpectroDriver>> {
        self.drivers.read().get(name).cloned()
    }

    /// Names of all registered drivers, sorted
    pub fn get_all_driver_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Ids accepted by [`register_driver`](Self::register_driver)
    pub fn available_drivers(&self) -> Vec<&'static str> {
        builtin::ids().collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.read().is_empty()
    }
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverManager")
            .field("drivers", &self.get_all_driver_names())
            .finish()
    }
}
