use serde::{Deserialize, Serialize};

use crate::types::{AddressResult, LocationSample};

/// Change notification emitted by the location cache.
///
/// `None` payloads mean the cached value was cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum CacheEvent {
    #[serde(rename = "cached_address_changed")]
    AddressChanged(Option<AddressResult>),
    #[serde(rename = "cached_location_changed")]
    LocationChanged(Option<LocationSample>),
}

impl CacheEvent {
    pub const ADDRESS_CHANGED: &'static str = "cached_address_changed";
    pub const LOCATION_CHANGED: &'static str = "cached_location_changed";

    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::AddressChanged(_) => Self::ADDRESS_CHANGED,
            CacheEvent::LocationChanged(_) => Self::LOCATION_CHANGED,
        }
    }

    pub fn is_cleared(&self) -> bool {
        match self {
            CacheEvent::AddressChanged(address) => address.is_none(),
            CacheEvent::LocationChanged(location) => location.is_none(),
        }
    }

    /// JSON rendering used when logging events
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"event\":\"{}\"}}", self.name()))
    }
}

impl std::fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
