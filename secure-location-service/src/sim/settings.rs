use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::location::MOCK_LOCATION_SETTING;
use crate::platform::{ObserverId, SecureSettings, SettingsObserver};

/// In-memory secure settings store.
///
/// Every write notifies every observer, whichever key changed.
#[derive(Default)]
pub struct SimulatedSettings {
    values: Mutex<HashMap<String, String>>,
    observers: Mutex<Vec<(ObserverId, Arc<dyn SettingsObserver>)>>,
    next_id: AtomicU64,
}

impl SimulatedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(&self, name: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        debug!("Secure setting {} = {}", name, value);
        self.notify();
    }

    pub fn set_mock_location(&self, enabled: bool) {
        self.put_string(MOCK_LOCATION_SETTING, if enabled { "1" } else { "0" });
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self) {
        let observers: Vec<Arc<dyn SettingsObserver>> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in observers {
            observer.on_change();
        }
    }
}

impl SecureSettings for SimulatedSettings {
    fn get_string(&self, name: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn register_observer(&self, observer: Arc<dyn SettingsObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    fn unregister_observer(&self, id: ObserverId) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(registered, _)| *registered != id);
    }
}
