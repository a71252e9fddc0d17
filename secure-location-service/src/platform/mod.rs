use std::sync::Arc;
use std::time::Duration;

use secure_location_common::{AddressResult, Criteria, LocationSample};

use crate::error::{GeocodeError, PlatformError};

/// Identity of a registered location listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Identity of a registered settings observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Callbacks delivered by the platform for a registered listener.
///
/// Implementations must not block; the platform may invoke them from any thread.
pub trait LocationListener: Send + Sync {
    fn id(&self) -> ListenerId;

    fn on_location_changed(&self, sample: LocationSample);

    fn on_provider_enabled(&self, provider: &str);

    fn on_provider_disabled(&self, provider: &str);
}

/// Parameters of a location update registration
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub provider: String,
    /// Minimum time between fixes
    pub min_time: Duration,
    /// Minimum distance between fixes in meters
    pub min_distance_m: f32,
}

/// Location provider registry of the device.
///
/// The service reaches location hardware only through this trait;
/// [`crate::sim::SimulatedPlatform`] is the in-memory implementation.
pub trait LocationPlatform: Send + Sync {
    /// Name of the provider that best meets `criteria`, optionally only among
    /// enabled providers.
    fn best_provider(&self, criteria: &Criteria, enabled_only: bool) -> Option<String>;

    /// Names of known providers, optionally only the enabled ones.
    fn providers(&self, enabled_only: bool) -> Vec<String>;

    fn all_providers(&self) -> Vec<String> {
        self.providers(false)
    }

    /// Start delivering updates for `request.provider` to `listener`.
    fn request_location_updates(
        &self,
        request: UpdateRequest,
        listener: Arc<dyn LocationListener>,
    ) -> Result<(), PlatformError>;

    /// Remove every registration of the given listener. Unknown ids are ignored.
    fn remove_updates(&self, listener: ListenerId);

    fn last_known_location(&self, provider: &str) -> Option<LocationSample>;
}

/// Receives change notifications from the secure settings store
pub trait SettingsObserver: Send + Sync {
    fn on_change(&self);
}

/// Device-wide secure settings store
pub trait SecureSettings: Send + Sync {
    fn get_string(&self, name: &str) -> Option<String>;

    fn register_observer(&self, observer: Arc<dyn SettingsObserver>) -> ObserverId;

    fn unregister_observer(&self, id: ObserverId);
}

/// Blocking reverse geocoder
pub trait Geocoder: Send + Sync {
    /// Up to `max_results` addresses near the given coordinates, best first.
    fn from_location(
        &self,
        latitude: f64,
        longitude: f64,
        max_results: usize,
    ) -> Result<Vec<AddressResult>, GeocodeError>;
}
