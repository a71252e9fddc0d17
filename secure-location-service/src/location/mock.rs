use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::platform::{ObserverId, SecureSettings, SettingsObserver};

use super::event::ServiceEvent;

/// Secure setting that allows apps to inject fake locations.
pub const MOCK_LOCATION_SETTING: &str = "mock_location";

/// Reads the mock location developer setting.
#[derive(Clone)]
pub struct MockLocationDetector {
    settings: Arc<dyn SecureSettings>,
}

impl MockLocationDetector {
    pub fn new(settings: Arc<dyn SecureSettings>) -> Self {
        Self { settings }
    }

    /// Whether location spoofing is currently permitted on the device.
    pub fn is_spoofing_enabled(&self) -> bool {
        let enabled = self
            .settings
            .get_string(MOCK_LOCATION_SETTING)
            .is_some_and(|value| value == "1");

        debug!(
            "Mock Location setting is {}",
            if enabled { "ENABLED" } else { "DISABLED" }
        );

        enabled
    }

    /// Forward every secure settings change to the owner task.
    pub(crate) fn watch(&self, tx: UnboundedSender<ServiceEvent>) -> ObserverId {
        self.settings
            .register_observer(Arc::new(SettingsForwarder { tx }))
    }

    pub(crate) fn unwatch(&self, id: ObserverId) {
        self.settings.unregister_observer(id);
    }
}

struct SettingsForwarder {
    tx: UnboundedSender<ServiceEvent>,
}

impl SettingsObserver for SettingsForwarder {
    fn on_change(&self) {
        if self.tx.send(ServiceEvent::SettingsChanged).is_err() {
            debug!("Settings change dropped, service is gone");
        }
    }
}
