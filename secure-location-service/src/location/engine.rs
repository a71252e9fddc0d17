use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use secure_location_common::{AddressResult, CacheEvent, LocationSample};

use crate::config::LocationConfig;
use crate::platform::{Geocoder, ListenerId, LocationPlatform, ObserverId, SecureSettings};

use super::cache::{CacheOutcome, LocationCache};
use super::event::ServiceEvent;
use super::geocode::GeocodeDispatcher;
use super::mock::MockLocationDetector;
use super::scheduler::UpdateScheduler;
use super::selector::{ProviderSelector, Selection};
use super::staleness::StalenessPolicy;

/// All mutable state of the service, owned by its task.
pub struct LocationEngine {
    cache: LocationCache,
    detector: MockLocationDetector,
    staleness: StalenessPolicy,
    selector: ProviderSelector,
    scheduler: UpdateScheduler,
    geocoder: GeocodeDispatcher,
    tx: UnboundedSender<ServiceEvent>,
    settings_observer: Option<ObserverId>,
    /// Set while mock location is (or was, until a fix is accepted) enabled
    providers_untrusted: bool,
}

impl LocationEngine {
    pub(crate) fn new(
        platform: Arc<dyn LocationPlatform>,
        settings: Arc<dyn SecureSettings>,
        geocoder: Arc<dyn Geocoder>,
        config: &LocationConfig,
        events: broadcast::Sender<CacheEvent>,
        tx: UnboundedSender<ServiceEvent>,
    ) -> Self {
        let detector = MockLocationDetector::new(settings);
        let providers_untrusted = detector.is_spoofing_enabled();

        Self {
            cache: LocationCache::new(events),
            detector,
            staleness: StalenessPolicy::new(config.max_age()),
            selector: ProviderSelector::new(
                platform,
                config.min_update_time(),
                config.min_update_distance_m,
                tx.clone(),
            ),
            scheduler: UpdateScheduler::new(tx.clone(), config.update_interval()),
            geocoder: GeocodeDispatcher::new(geocoder, tx.clone()),
            tx,
            settings_observer: None,
            providers_untrusted,
        }
    }

    /// Start watching settings and kick off the first update cycle.
    pub fn start(&mut self) {
        if self.settings_observer.is_none() {
            self.settings_observer = Some(self.detector.watch(self.tx.clone()));
        }

        if self.providers_untrusted {
            info!("Mock location is enabled, locations will not be trusted");
        }

        self.update_location();
    }

    /// Stop watching settings, remove listeners and cancel the pending update.
    pub fn shutdown(&mut self) {
        if let Some(id) = self.settings_observer.take() {
            self.detector.unwatch(id);
        }
        self.selector.unregister_all();
        self.scheduler.cancel();
        info!("Location engine shut down");
    }

    /// Update right away if the cache is stale, otherwise after the standard interval.
    pub fn update_location(&mut self) {
        if self.staleness.is_stale(self.cache.location()) {
            self.scheduler.schedule_update(Duration::ZERO);
        } else {
            self.scheduler.schedule_standard();
        }
    }

    /// Offer a sample to the cache.
    pub fn accept(&mut self, sample: LocationSample) -> CacheOutcome {
        if self.providers_untrusted {
            debug!(
                "Location source is untrusted, will not cache. Location timestamp: {}",
                sample.timestamp
            );
            return CacheOutcome::RejectedUntrusted;
        }

        if self.staleness.is_stale(Some(&sample)) {
            debug!(
                "Location is stale, will not cache. Location timestamp: {}",
                sample.timestamp
            );
            return CacheOutcome::RejectedStale;
        }

        info!(
            "New cached location set: {:.6}/{:.6} from {}",
            sample.latitude, sample.longitude, sample.provider
        );

        // One fix per cycle, listening resumes with the next scheduled update
        self.cache.set_location(Some(sample.clone()));
        self.selector.unregister_all();
        self.geocoder.resolve(&sample);
        self.providers_untrusted = false;
        self.scheduler.schedule_standard();

        CacheOutcome::Accepted
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn get(&self) -> (Option<&LocationSample>, Option<&AddressResult>) {
        self.cache.get()
    }

    pub fn cached_location(&self) -> Option<&LocationSample> {
        self.cache.location()
    }

    pub fn cached_address(&self) -> Option<&AddressResult> {
        self.cache.address()
    }

    pub fn providers_untrusted(&self) -> bool {
        self.providers_untrusted
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    pub fn register_best_listener(&mut self) -> Selection {
        self.selector.register_best_listener()
    }

    pub(crate) fn on_update_due(&mut self, generation: u64) {
        if !self.scheduler.take_due(generation) {
            return;
        }

        if self.providers_untrusted {
            debug!("Providers are untrusted, trying again later");
            self.scheduler.schedule_standard();
        } else {
            self.register_best_listener();
        }
    }

    pub(crate) fn on_settings_changed(&mut self) {
        if self.detector.is_spoofing_enabled() {
            if !self.providers_untrusted {
                warn!("Mock location was enabled, clearing cached location");
            }
            self.providers_untrusted = true;
            self.clear();
        } else if self.providers_untrusted {
            info!("Mock location was disabled, requesting a new location");
            self.providers_untrusted = false;
            self.register_best_listener();
        }
    }

    pub(crate) fn on_location_changed(&mut self, listener: ListenerId, sample: LocationSample) -> Option<CacheOutcome> {
        if self.selector.role_of(listener).is_none() {
            debug!("Dropping fix from removed {}", listener);
            return None;
        }
        Some(self.accept(sample))
    }

    pub(crate) fn on_provider_enabled(&mut self, listener: ListenerId, provider: &str) {
        match self.selector.role_of(listener) {
            Some(role) if role.reselect_on_enabled() => {
                info!("Provider {} enabled, selecting providers again", provider);
                self.register_best_listener();
            }
            Some(role) => debug!("Provider {} enabled, {} listener ignores it", provider, role),
            None => debug!("Dropping provider change from removed {}", listener),
        }
    }

    pub(crate) fn on_provider_disabled(&mut self, listener: ListenerId, provider: &str) {
        match self.selector.role_of(listener) {
            Some(role) if role.reselect_on_disabled() => {
                info!("Provider {} disabled, selecting providers again", provider);
                self.register_best_listener();
            }
            Some(role) => debug!("Provider {} disabled, {} listener ignores it", provider, role),
            None => debug!("Dropping provider change from removed {}", listener),
        }
    }

    /// Store a geocode result. Late results overwrite whatever is cached.
    pub(crate) fn on_address_resolved(&mut self, address: AddressResult) {
        debug!("Cached address set: {}", address.summary());
        self.cache.set_address(Some(address));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::mock::MOCK_LOCATION_SETTING;
    use crate::sim::{SimulatedGeocoder, SimulatedPlatform, SimulatedSettings};
    use chrono::Utc;
    use secure_location_common::{AccuracyClass, PowerClass, ProviderProperties};
    use tokio::sync::mpsc;

    struct Fixture {
        engine: LocationEngine,
        platform: Arc<SimulatedPlatform>,
        settings: Arc<SimulatedSettings>,
        geocoder: Arc<SimulatedGeocoder>,
        rx: mpsc::UnboundedReceiver<ServiceEvent>,
        events: broadcast::Receiver<CacheEvent>,
    }

    fn fixture(mock_location: bool) -> Fixture {
        let platform = Arc::new(SimulatedPlatform::new(vec![ProviderProperties::new(
            "network",
            AccuracyClass::Coarse,
            PowerClass::Low,
        )]));
        let settings = Arc::new(SimulatedSettings::new());
        settings.set_mock_location(mock_location);
        let geocoder = Arc::new(SimulatedGeocoder::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events) = broadcast::channel(16);

        let engine = LocationEngine::new(
            platform.clone(),
            settings.clone(),
            geocoder.clone(),
            &LocationConfig::default(),
            events_tx,
            tx,
        );

        Fixture {
            engine,
            platform,
            settings,
            geocoder,
            rx,
            events,
        }
    }

    fn sample_aged(minutes: i64) -> LocationSample {
        LocationSample::new(
            "network",
            43.629444,
            1.363889,
            Utc::now() - chrono::Duration::minutes(minutes),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_fresh_sample() {
        let mut f = fixture(false);
        f.engine.register_best_listener();
        assert!(f.engine.selector().has_active_listeners());

        let sample = sample_aged(1);
        let accepted_at = tokio::time::Instant::now();
        let outcome = f.engine.accept(sample.clone());
        assert_eq!(outcome, CacheOutcome::Accepted);
        assert!(outcome.is_accepted());

        assert_eq!(f.engine.cached_location(), Some(&sample));
        assert!(!f.engine.selector().has_active_listeners());
        assert!(f.platform.registrations().is_empty());

        // Next cycle at the standard interval
        let interval = f.engine.scheduler().standard_interval();
        assert_eq!(interval, Duration::from_secs(600));
        assert_eq!(f.engine.scheduler().due_at(), Some(accepted_at + interval));
        assert_eq!(
            f.events.try_recv().unwrap(),
            CacheEvent::LocationChanged(Some(sample))
        );

        // Geocode result comes back through the owner queue
        loop {
            match f.rx.recv().await {
                Some(ServiceEvent::AddressResolved(address)) => {
                    assert!(address.is_minimal());
                    f.engine.on_address_resolved(address);
                    break;
                }
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        }
        assert_eq!(f.geocoder.lookups(), 1);
        assert!(matches!(
            f.events.try_recv().unwrap(),
            CacheEvent::AddressChanged(Some(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_stale_sample() {
        let mut f = fixture(false);

        let outcome = f.engine.accept(sample_aged(11));
        assert_eq!(outcome, CacheOutcome::RejectedStale);
        assert!(!outcome.is_accepted());
        assert_eq!(f.engine.get(), (None, None));
        assert!(f.events.try_recv().is_err());
        assert!(!f.engine.scheduler().is_pending());
    }

    #[tokio::test]
    async fn test_reject_untrusted_sample() {
        let mut f = fixture(true);
        assert!(f.engine.providers_untrusted());

        assert_eq!(f.engine.accept(sample_aged(0)), CacheOutcome::RejectedUntrusted);
        assert_eq!(f.engine.get(), (None, None));
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mock_location_toggle() {
        let mut f = fixture(false);
        f.engine.accept(sample_aged(1));
        f.engine.on_address_resolved(AddressResult::minimal(43.629444, 1.363889));
        while f.events.try_recv().is_ok() {}

        f.settings.put_string(MOCK_LOCATION_SETTING, "1");
        f.engine.on_settings_changed();
        assert!(f.engine.providers_untrusted());
        assert_eq!(f.engine.get(), (None, None));
        assert_eq!(f.events.try_recv().unwrap(), CacheEvent::AddressChanged(None));
        assert_eq!(f.events.try_recv().unwrap(), CacheEvent::LocationChanged(None));

        f.settings.put_string(MOCK_LOCATION_SETTING, "0");
        f.engine.on_settings_changed();
        assert!(!f.engine.providers_untrusted());
        assert_eq!(f.platform.registrations().len(), 1);

        // Unrelated settings changes do nothing once trusted
        f.engine.on_settings_changed();
        assert_eq!(f.platform.registrations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untrusted_update_reschedules() {
        let mut f = fixture(true);
        f.engine.start();

        let generation = loop {
            match f.rx.recv().await {
                Some(ServiceEvent::UpdateDue { generation }) => break generation,
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        };
        f.engine.on_update_due(generation);

        assert!(f.platform.registrations().is_empty());
        assert!(f.engine.scheduler().is_pending());
    }

    #[tokio::test]
    async fn test_callbacks_from_removed_listener_are_dropped() {
        let mut f = fixture(false);
        f.engine.register_best_listener();
        let stale_listener = f.platform.registrations()[0].listener;

        f.engine.register_best_listener();
        assert_eq!(f.engine.on_location_changed(stale_listener, sample_aged(1)), None);
        assert_eq!(f.engine.get(), (None, None));
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let mut f = fixture(false);
        f.engine.start();
        f.engine.register_best_listener();
        assert_eq!(f.settings.observer_count(), 1);

        f.engine.shutdown();
        assert_eq!(f.settings.observer_count(), 0);
        assert!(f.platform.registrations().is_empty());
        assert!(!f.engine.scheduler().is_pending());
    }
}
