use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use secure_location_common::{Criteria, LocationSample};

use crate::platform::{ListenerId, LocationListener, LocationPlatform, UpdateRequest};

use super::event::ServiceEvent;

/// Part a listener plays in the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerRole {
    /// Watches the best provider while it is disabled
    Best,
    /// Receives fixes from the best enabled provider
    BestAvailable,
}

impl ListenerRole {
    /// Whether a provider becoming enabled should trigger a new selection
    pub fn reselect_on_enabled(&self) -> bool {
        matches!(self, ListenerRole::Best)
    }

    /// Whether a provider becoming disabled should trigger a new selection
    pub fn reselect_on_disabled(&self) -> bool {
        matches!(self, ListenerRole::BestAvailable)
    }
}

impl std::fmt::Display for ListenerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerRole::Best => write!(f, "best"),
            ListenerRole::BestAvailable => write!(f, "best-available"),
        }
    }
}

/// Shape of the listeners registered by one selection cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The device has no provider meeting the criteria at all
    NoProviders,
    /// The best provider is enabled and is the only one listened to
    Single { provider: String },
    /// The best provider is disabled, fixes come from the best enabled one
    Dual { best: String, best_available: String },
    /// Nothing is enabled, every provider is watched for becoming enabled
    AwaitingAny { best: String, watched: Vec<String> },
}

/// Listener that forwards platform callbacks to the owner task
struct ForwardingListener {
    id: ListenerId,
    tx: UnboundedSender<ServiceEvent>,
}

impl ForwardingListener {
    fn forward(&self, event: ServiceEvent) {
        if self.tx.send(event).is_err() {
            debug!("{} callback dropped, service is gone", self.id);
        }
    }
}

impl LocationListener for ForwardingListener {
    fn id(&self) -> ListenerId {
        self.id
    }

    fn on_location_changed(&self, sample: LocationSample) {
        self.forward(ServiceEvent::LocationChanged {
            listener: self.id,
            sample,
        });
    }

    fn on_provider_enabled(&self, provider: &str) {
        self.forward(ServiceEvent::ProviderEnabled {
            listener: self.id,
            provider: provider.to_string(),
        });
    }

    fn on_provider_disabled(&self, provider: &str) {
        self.forward(ServiceEvent::ProviderDisabled {
            listener: self.id,
            provider: provider.to_string(),
        });
    }
}

/// Owns the location listener registrations of the service.
///
/// Listener ids are never reused, so callbacks queued by a listener that has
/// since been removed can be recognized and dropped.
pub struct ProviderSelector {
    platform: Arc<dyn LocationPlatform>,
    criteria: Criteria,
    min_time: Duration,
    min_distance_m: f32,
    tx: UnboundedSender<ServiceEvent>,
    next_id: u64,
    active: Vec<(ListenerId, ListenerRole)>,
}

impl ProviderSelector {
    pub(crate) fn new(
        platform: Arc<dyn LocationPlatform>,
        min_time: Duration,
        min_distance_m: f32,
        tx: UnboundedSender<ServiceEvent>,
    ) -> Self {
        Self {
            platform,
            criteria: Criteria::listener_profile(),
            min_time,
            min_distance_m,
            tx,
            next_id: 1,
            active: Vec::new(),
        }
    }

    /// Role of a currently registered listener, `None` once it was removed.
    pub fn role_of(&self, id: ListenerId) -> Option<ListenerRole> {
        self.active
            .iter()
            .find(|(active, _)| *active == id)
            .map(|(_, role)| *role)
    }

    pub fn has_active_listeners(&self) -> bool {
        !self.active.is_empty()
    }

    /// Remove every listener registered by this selector. Safe to repeat.
    pub fn unregister_all(&mut self) {
        for (id, role) in self.active.drain(..) {
            debug!("Removing {} {}", role, id);
            self.platform.remove_updates(id);
        }
    }

    /// Replace the current registrations with the best available arrangement.
    ///
    /// Asks for the best provider under [`Criteria::listener_profile`] over
    /// every provider and over the enabled ones only. If the best one is
    /// enabled it gets a single best-available listener. Otherwise a best
    /// listener waits for it to be enabled while a best-available listener
    /// takes fixes from the best enabled provider. With nothing enabled the
    /// best listener watches every provider instead.
    pub fn register_best_listener(&mut self) -> Selection {
        self.unregister_all();

        let best = self.platform.best_provider(&self.criteria, false);
        let best_available = self.platform.best_provider(&self.criteria, true);

        debug!(
            "Best provider: {:?} / Best available provider: {:?}",
            best, best_available
        );

        let Some(best) = best else {
            warn!("No location providers exist on this device, listeners will not be set");
            return Selection::NoProviders;
        };

        if best_available.as_deref() == Some(best.as_str()) {
            let listener = self.new_listener(ListenerRole::BestAvailable);
            self.request(&best, self.min_time, self.min_distance_m, listener);
            info!("Listening to best provider {}", best);
            return Selection::Single { provider: best };
        }

        let best_listener = self.new_listener(ListenerRole::Best);
        self.request(&best, self.min_time, self.min_distance_m, best_listener.clone());

        match best_available {
            Some(best_available) => {
                let listener = self.new_listener(ListenerRole::BestAvailable);
                self.request(&best_available, self.min_time, self.min_distance_m, listener);
                info!(
                    "Best provider {} is disabled, listening to {} until it is enabled",
                    best, best_available
                );
                Selection::Dual {
                    best,
                    best_available,
                }
            }
            None => {
                // Nothing is enabled, so the hardware is off and a zero interval costs nothing
                let watched = self.platform.all_providers();
                for provider in &watched {
                    self.request(provider, Duration::ZERO, 0.0, best_listener.clone());
                }
                info!(
                    "No location provider is enabled, watching {} providers",
                    watched.len()
                );
                Selection::AwaitingAny { best, watched }
            }
        }
    }

    fn new_listener(&mut self, role: ListenerRole) -> Arc<ForwardingListener> {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.active.push((id, role));

        Arc::new(ForwardingListener {
            id,
            tx: self.tx.clone(),
        })
    }

    fn request(
        &self,
        provider: &str,
        min_time: Duration,
        min_distance_m: f32,
        listener: Arc<ForwardingListener>,
    ) {
        let request = UpdateRequest {
            provider: provider.to_string(),
            min_time,
            min_distance_m,
        };
        let id = listener.id;

        if let Err(e) = self.platform.request_location_updates(request, listener) {
            warn!("Failed to register {} on provider {}: {}", id, provider, e);
        }
    }
}
