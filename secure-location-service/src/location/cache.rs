use tokio::sync::broadcast;
use tracing::debug;

use secure_location_common::{AddressResult, CacheEvent, LocationSample};

/// Result of offering a sample to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Accepted,
    /// Mock location is (or was recently) enabled
    RejectedUntrusted,
    /// Sample is older than the max age
    RejectedStale,
}

impl CacheOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CacheOutcome::Accepted)
    }
}

/// Most recently accepted location and its address.
///
/// Every write publishes a [`CacheEvent`]; having no subscribers is fine.
pub struct LocationCache {
    location: Option<LocationSample>,
    address: Option<AddressResult>,
    events: broadcast::Sender<CacheEvent>,
}

impl LocationCache {
    pub fn new(events: broadcast::Sender<CacheEvent>) -> Self {
        Self {
            location: None,
            address: None,
            events,
        }
    }

    pub fn location(&self) -> Option<&LocationSample> {
        self.location.as_ref()
    }

    pub fn address(&self) -> Option<&AddressResult> {
        self.address.as_ref()
    }

    pub fn get(&self) -> (Option<&LocationSample>, Option<&AddressResult>) {
        (self.location.as_ref(), self.address.as_ref())
    }

    pub fn set_location(&mut self, location: Option<LocationSample>) {
        self.location = location.clone();
        self.publish(CacheEvent::LocationChanged(location));
    }

    pub fn set_address(&mut self, address: Option<AddressResult>) {
        self.address = address.clone();
        self.publish(CacheEvent::AddressChanged(address));
    }

    /// Drop both values, address first.
    pub fn clear(&mut self) {
        self.set_address(None);
        self.set_location(None);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: CacheEvent) {
        let name = event.name();
        match self.events.send(event) {
            Ok(receivers) => debug!("Published {} to {} subscribers", name, receivers),
            Err(_) => debug!("Published {} with no subscribers", name),
        }
    }
}
