use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use secure_location_common::{AddressResult, CacheEvent, LocationSample, PASSIVE_PROVIDER};

use crate::config::LocationConfig;
use crate::error::ServiceError;
use crate::platform::{Geocoder, LocationPlatform, SecureSettings};

use super::engine::LocationEngine;
use super::event::{Query, ServiceEvent};
use super::mock::MockLocationDetector;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Background service that keeps a trusted, fresh location cached.
///
/// Listeners are only registered until the first acceptable fix arrives and
/// are removed until the next scheduled cycle. Fixes are refused while the
/// mock location setting is enabled, and the cache is cleared the moment it
/// gets enabled. Fixes older than the max age are refused.
///
/// All state lives in a [`LocationEngine`](super::LocationEngine) driven by a
/// single task. Rooted devices can spoof locations without touching the mock
/// location setting; that is not detected.
pub struct SecureLocationService;

impl SecureLocationService {
    /// Start the service on the current tokio runtime.
    ///
    /// The service runs until [`ServiceHandle::stop`] is called; it is never
    /// restarted automatically.
    pub fn start(
        platform: Arc<dyn LocationPlatform>,
        settings: Arc<dyn SecureSettings>,
        geocoder: Arc<dyn Geocoder>,
        config: LocationConfig,
    ) -> ServiceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut engine = LocationEngine::new(
            platform.clone(),
            settings.clone(),
            geocoder,
            &config,
            events.clone(),
            tx.clone(),
        );
        engine.start();

        info!(
            "Secure location service started (max age: {} min, update interval: {} min)",
            config.max_age_minutes, config.update_interval_minutes
        );

        let task = tokio::spawn(run(engine, rx));

        ServiceHandle {
            tx,
            events,
            platform,
            detector: MockLocationDetector::new(settings),
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }
}

async fn run(mut engine: LocationEngine, mut rx: UnboundedReceiver<ServiceEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ServiceEvent::LocationChanged { listener, sample } => {
                if let Some(outcome) = engine.on_location_changed(listener, sample) {
                    debug!("Location from {} handled: {:?}", listener, outcome);
                }
            }
            ServiceEvent::ProviderEnabled { listener, provider } => {
                engine.on_provider_enabled(listener, &provider);
            }
            ServiceEvent::ProviderDisabled { listener, provider } => {
                engine.on_provider_disabled(listener, &provider);
            }
            ServiceEvent::SettingsChanged => engine.on_settings_changed(),
            ServiceEvent::UpdateDue { generation } => engine.on_update_due(generation),
            ServiceEvent::AddressResolved(address) => engine.on_address_resolved(address),
            ServiceEvent::Query(query) => answer(&engine, query),
            ServiceEvent::Stop(done) => {
                engine.shutdown();
                let _ = done.send(());
                break;
            }
        }
    }

    info!("Secure location service stopped");
}

fn answer(engine: &LocationEngine, query: Query) {
    // A client that gave up waiting is not an error
    match query {
        Query::CachedLocation(reply) => {
            let _ = reply.send(engine.cached_location().cloned());
        }
        Query::CachedAddress(reply) => {
            let _ = reply.send(engine.cached_address().cloned());
        }
        Query::ProvidersUntrusted(reply) => {
            let _ = reply.send(engine.providers_untrusted());
        }
    }
}

/// Client handle to a running [`SecureLocationService`].
#[derive(Clone)]
pub struct ServiceHandle {
    tx: UnboundedSender<ServiceEvent>,
    events: broadcast::Sender<CacheEvent>,
    platform: Arc<dyn LocationPlatform>,
    detector: MockLocationDetector,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl ServiceHandle {
    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Query) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ServiceEvent::Query(make(reply)))
            .map_err(|_| ServiceError::Stopped)?;
        response.await.map_err(|_| ServiceError::Stopped)
    }

    /// Last accepted location, `None` if nothing is cached.
    pub async fn cached_location(&self) -> Result<Option<LocationSample>, ServiceError> {
        self.query(Query::CachedLocation).await
    }

    /// Address of the last accepted location, `None` until geocoding finished.
    pub async fn cached_address(&self) -> Result<Option<AddressResult>, ServiceError> {
        self.query(Query::CachedAddress).await
    }

    /// Whether incoming locations are currently being refused.
    pub async fn providers_untrusted(&self) -> Result<bool, ServiceError> {
        self.query(Query::ProvidersUntrusted).await
    }

    /// Last fix seen by the passive provider.
    pub fn passive_location(&self) -> Option<LocationSample> {
        self.platform.last_known_location(PASSIVE_PROVIDER)
    }

    /// True if at least one provider other than the passive one is enabled.
    pub fn are_providers_enabled(&self) -> bool {
        self.platform
            .providers(true)
            .iter()
            .any(|name| name != PASSIVE_PROVIDER)
    }

    /// Whether the device has `provider`, enabled or not.
    pub fn has_provider(&self, provider: &str) -> bool {
        self.platform.providers(false).iter().any(|name| name == provider)
    }

    pub fn is_mock_location_enabled(&self) -> bool {
        self.detector.is_spoofing_enabled()
    }

    /// Receive cached address/location change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Stop the service: settings observer and location listeners are removed.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let (done, stopped) = oneshot::channel();
        self.tx
            .send(ServiceEvent::Stop(done))
            .map_err(|_| ServiceError::Stopped)?;
        stopped.await.map_err(|_| ServiceError::Stopped)?;

        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
        Ok(())
    }
}
