use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use secure_location_common::{
    AccuracyClass, Criteria, LocationSample, PowerClass, ProviderProperties, PASSIVE_PROVIDER,
};

use crate::error::PlatformError;
use crate::platform::{ListenerId, LocationListener, LocationPlatform, UpdateRequest};

/// Snapshot of one listener registration, for inspection
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub provider: String,
    pub listener: ListenerId,
    pub min_time: Duration,
    pub min_distance_m: f32,
}

struct ActiveRegistration {
    request: UpdateRequest,
    listener: Arc<dyn LocationListener>,
}

#[derive(Default)]
struct PlatformState {
    providers: Vec<ProviderProperties>,
    registrations: Vec<ActiveRegistration>,
    last_known: HashMap<String, LocationSample>,
}

/// In-memory provider registry.
///
/// Always contains the passive provider, which is enabled, never selected as
/// best and receives a copy of every fix delivered by the other providers.
pub struct SimulatedPlatform {
    state: Mutex<PlatformState>,
}

impl SimulatedPlatform {
    pub fn new(providers: Vec<ProviderProperties>) -> Self {
        let mut providers: Vec<ProviderProperties> = providers
            .into_iter()
            .filter(|p| !p.is_passive())
            .collect();
        providers.push(ProviderProperties::new(
            PASSIVE_PROVIDER,
            AccuracyClass::Coarse,
            PowerClass::Low,
        ));

        Self {
            state: Mutex::new(PlatformState {
                providers,
                ..Default::default()
            }),
        }
    }

    /// A device with no location hardware at all
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.state()
            .registrations
            .iter()
            .map(|r| Registration {
                provider: r.request.provider.clone(),
                listener: r.listener.id(),
                min_time: r.request.min_time,
                min_distance_m: r.request.min_distance_m,
            })
            .collect()
    }

    pub fn is_enabled(&self, provider: &str) -> bool {
        self.state()
            .providers
            .iter()
            .any(|p| p.name == provider && p.enabled)
    }

    /// Flip a provider on or off and notify listeners registered on it.
    /// Returns false for unknown providers or when nothing changed.
    pub fn set_provider_enabled(&self, provider: &str, enabled: bool) -> bool {
        let listeners = {
            let mut state = self.state();
            let Some(properties) = state.providers.iter_mut().find(|p| p.name == provider) else {
                return false;
            };
            if properties.enabled == enabled || properties.is_passive() {
                return false;
            }
            properties.enabled = enabled;
            Self::listeners_on(&state, provider)
        };

        debug!(
            "Provider {} {} ({} listeners)",
            provider,
            if enabled { "enabled" } else { "disabled" },
            listeners.len()
        );

        // Callbacks run outside the lock so listeners may call back into the platform
        for listener in listeners {
            if enabled {
                listener.on_provider_enabled(provider);
            } else {
                listener.on_provider_disabled(provider);
            }
        }
        true
    }

    /// Report a fix from `sample.provider`. Disabled providers produce nothing.
    /// Returns the number of listeners the fix was delivered to.
    pub fn push_location(&self, sample: LocationSample) -> usize {
        let provider = sample.provider.clone();
        let listeners = {
            let mut state = self.state();
            let enabled = state
                .providers
                .iter()
                .any(|p| p.name == provider && p.enabled);
            if !enabled {
                trace!("Dropping fix from disabled or unknown provider {}", provider);
                return 0;
            }

            state.last_known.insert(provider.clone(), sample.clone());
            if state.providers.iter().any(|p| p.is_passive()) {
                state
                    .last_known
                    .insert(PASSIVE_PROVIDER.to_string(), sample.clone());
            }

            let mut listeners = Self::listeners_on(&state, &provider);
            if provider != PASSIVE_PROVIDER {
                listeners.extend(Self::listeners_on(&state, PASSIVE_PROVIDER));
            }
            listeners
        };

        for listener in &listeners {
            listener.on_location_changed(sample.clone());
        }
        listeners.len()
    }

    fn listeners_on(state: &PlatformState, provider: &str) -> Vec<Arc<dyn LocationListener>> {
        state
            .registrations
            .iter()
            .filter(|r| r.request.provider == provider)
            .map(|r| r.listener.clone())
            .collect()
    }

    fn matching<'a>(
        candidates: &[&'a ProviderProperties],
        criteria: &Criteria,
    ) -> Vec<&'a ProviderProperties> {
        candidates
            .iter()
            .copied()
            .filter(|p| criteria.satisfied_by(p))
            .collect()
    }
}

impl LocationPlatform for SimulatedPlatform {
    /// Loosens power, then accuracy, then the altitude/bearing/speed
    /// requirements until something matches. Among matches the most accurate
    /// wins, then the least power hungry, then declaration order.
    fn best_provider(&self, criteria: &Criteria, enabled_only: bool) -> Option<String> {
        let state = self.state();
        let candidates: Vec<&ProviderProperties> = state
            .providers
            .iter()
            .filter(|p| !p.is_passive() && (!enabled_only || p.enabled))
            .collect();

        let mut criteria = *criteria;
        let mut good = Self::matching(&candidates, &criteria);

        while good.is_empty() && criteria.power.is_some() {
            criteria.power = criteria.power.and_then(|p| p.loosen());
            good = Self::matching(&candidates, &criteria);
        }
        while good.is_empty() && criteria.accuracy.is_some() {
            criteria.accuracy = match criteria.accuracy {
                Some(AccuracyClass::Fine) => Some(AccuracyClass::Coarse),
                _ => None,
            };
            good = Self::matching(&candidates, &criteria);
        }
        if good.is_empty() {
            criteria.altitude_required = false;
            criteria.bearing_required = false;
            criteria.speed_required = false;
            good = Self::matching(&candidates, &criteria);
        }

        good.into_iter()
            .enumerate()
            .min_by_key(|(index, p)| (p.accuracy, p.power, *index))
            .map(|(_, p)| p.name.clone())
    }

    fn providers(&self, enabled_only: bool) -> Vec<String> {
        self.state()
            .providers
            .iter()
            .filter(|p| !enabled_only || p.enabled)
            .map(|p| p.name.clone())
            .collect()
    }

    fn request_location_updates(
        &self,
        request: UpdateRequest,
        listener: Arc<dyn LocationListener>,
    ) -> Result<(), PlatformError> {
        let mut state = self.state();
        if !state.providers.iter().any(|p| p.name == request.provider) {
            return Err(PlatformError::UnknownProvider(request.provider));
        }

        let id = listener.id();
        // Same listener and provider replaces the earlier request
        state
            .registrations
            .retain(|r| !(r.listener.id() == id && r.request.provider == request.provider));

        trace!(
            "{} registered on {} (min time {:?}, min distance {}m)",
            id, request.provider, request.min_time, request.min_distance_m
        );
        state
            .registrations
            .push(ActiveRegistration { request, listener });
        Ok(())
    }

    fn remove_updates(&self, listener: ListenerId) {
        self.state()
            .registrations
            .retain(|r| r.listener.id() != listener);
    }

    fn last_known_location(&self, provider: &str) -> Option<LocationSample> {
        self.state().last_known.get(provider).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        fixes: AtomicUsize,
        enabled: AtomicUsize,
        disabled: AtomicUsize,
    }

    struct Counting(ListenerId, Arc<CountingListener>);

    impl LocationListener for Counting {
        fn id(&self) -> ListenerId {
            self.0
        }
        fn on_location_changed(&self, _sample: LocationSample) {
            self.1.fixes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_provider_enabled(&self, _provider: &str) {
            self.1.enabled.fetch_add(1, Ordering::SeqCst);
        }
        fn on_provider_disabled(&self, _provider: &str) {
            self.1.disabled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request(provider: &str) -> UpdateRequest {
        UpdateRequest {
            provider: provider.to_string(),
            min_time: Duration::from_secs(30),
            min_distance_m: 0.0,
        }
    }

    fn gps() -> ProviderProperties {
        ProviderProperties::new("gps", AccuracyClass::Fine, PowerClass::High)
    }

    fn network() -> ProviderProperties {
        ProviderProperties::new("network", AccuracyClass::Coarse, PowerClass::Low)
    }

    #[test]
    fn test_best_provider_prefers_matching_low_power() {
        let platform = SimulatedPlatform::new(vec![gps(), network()]);
        let criteria = Criteria::listener_profile();

        assert_eq!(platform.best_provider(&criteria, false).as_deref(), Some("network"));

        platform.set_provider_enabled("network", false);
        assert_eq!(platform.best_provider(&criteria, false).as_deref(), Some("network"));
        // Power requirement is loosened until gps qualifies
        assert_eq!(platform.best_provider(&criteria, true).as_deref(), Some("gps"));

        platform.set_provider_enabled("gps", false);
        assert_eq!(platform.best_provider(&criteria, true), None);
    }

    #[test]
    fn test_passive_is_never_best() {
        let platform = SimulatedPlatform::new(Vec::new());
        assert_eq!(platform.providers(true), vec![PASSIVE_PROVIDER.to_string()]);
        assert_eq!(platform.best_provider(&Criteria::default(), false), None);
        assert!(!platform.set_provider_enabled(PASSIVE_PROVIDER, false));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let platform = SimulatedPlatform::new(vec![network()]);
        let listener = Arc::new(Counting(ListenerId(1), Arc::default()));
        assert!(matches!(
            platform.request_location_updates(request("gps"), listener),
            Err(PlatformError::UnknownProvider(name)) if name == "gps"
        ));
    }

    #[test]
    fn test_delivery_and_removal() {
        let platform = SimulatedPlatform::new(vec![network(), gps()]);
        let counts = Arc::new(CountingListener::default());
        let listener = Arc::new(Counting(ListenerId(7), counts.clone()));

        platform
            .request_location_updates(request("network"), listener.clone())
            .unwrap();
        platform
            .request_location_updates(request("network"), listener)
            .unwrap();
        assert_eq!(platform.registrations().len(), 1);

        let fix = LocationSample::new("network", 1.0, 2.0, Utc::now());
        assert_eq!(platform.push_location(fix.clone()), 1);
        assert_eq!(platform.push_location(LocationSample::new("gps", 1.0, 2.0, Utc::now())), 0);
        assert_eq!(platform.last_known_location("network"), Some(fix));
        assert!(platform.last_known_location(PASSIVE_PROVIDER).is_some());

        platform.set_provider_enabled("network", false);
        platform.set_provider_enabled("network", true);
        platform.set_provider_enabled("gps", false);
        assert_eq!(counts.fixes.load(Ordering::SeqCst), 1);
        assert_eq!(counts.enabled.load(Ordering::SeqCst), 1);
        assert_eq!(counts.disabled.load(Ordering::SeqCst), 1);

        platform.remove_updates(ListenerId(7));
        assert!(platform.registrations().is_empty());
        assert_eq!(
            platform.push_location(LocationSample::new("network", 1.0, 2.0, Utc::now())),
            0
        );
    }
}
