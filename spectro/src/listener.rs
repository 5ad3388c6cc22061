//! Session listeners

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use spectro_types::{OperationalStatus, SpectroEvent};
use tracing::warn;

/// Receives the outcome of every operation on a session
///
/// All methods default to doing nothing. Callbacks run synchronously on the
/// task that performed the operation, once the exchange has completed.
pub trait SpectroListener: Send + Sync {
    fn measured(&self, _event: &SpectroEvent) {}

    fn calibrated(&self, _event: &SpectroEvent) {}

    /// Status queries and applied settings
    fn settings_changed(&self, _event: &SpectroEvent) {}

    fn operational_status_changed(&self, _status: OperationalStatus) {}

    fn number_standards_found(&self, _event: &SpectroEvent) {}

    fn retrieved_standard(&self, _event: &SpectroEvent) {}

    fn number_samples_found(&self, _event: &SpectroEvent) {}

    fn retrieved_sample(&self, _event: &SpectroEvent) {}
}

/// Ordered listener set
///
/// Delivery works on a snapshot, so a callback may add or remove listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: RwLock<Vec<Arc<dyn SpectroListener>>>,
}

fn same(a: &Arc<dyn SpectroListener>, b: &Arc<dyn SpectroListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Listeners {
    /// Add a listener; adding the same listener twice is a no-op
    pub fn add(&self, listener: Arc<dyn SpectroListener>) {
        let mut listeners = self.inner.write();
        if !listeners.iter().any(|existing| same(existing, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove(&self, listener: &Arc<dyn SpectroListener>) -> bool {
        let mut listeners = self.inner.write();
        let before = listeners.len();
        listeners.retain(|existing| !same(existing, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Call `deliver` for every listener in registration order
    ///
    /// A panicking listener is logged and skipped.
    pub fn dispatch(&self, callback: &str, deliver: impl Fn(&dyn SpectroListener)) {
        let snapshot = self.inner.read().clone();

        for (index, listener) in snapshot.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref()))).is_err() {
                warn!(callback, index, "Listener panicked, continuing with the next one");
            }
        }
    }
}
