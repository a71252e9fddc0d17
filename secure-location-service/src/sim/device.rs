use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use secure_location_common::LocationSample;

use crate::config::DeviceConfig;

use super::geocoder::SimulatedGeocoder;
use super::platform::SimulatedPlatform;
use super::settings::SimulatedSettings;

/// One scripted fix. Timestamps are taken when the fix is replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePoint {
    pub provider: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f32>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub bearing: Option<f32>,
    #[serde(default)]
    pub speed: Option<f32>,
}

impl RoutePoint {
    pub fn to_sample(&self) -> LocationSample {
        LocationSample {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            altitude: self.altitude,
            bearing: self.bearing,
            speed: self.speed,
            provider: self.provider.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Platform, settings store and geocoder of one simulated device
#[derive(Clone)]
pub struct SimulatedDevice {
    pub platform: Arc<SimulatedPlatform>,
    pub settings: Arc<SimulatedSettings>,
    pub geocoder: Arc<SimulatedGeocoder>,
}

impl SimulatedDevice {
    pub fn from_config(config: &DeviceConfig) -> Self {
        let settings = SimulatedSettings::new();
        settings.set_mock_location(config.mock_location);

        let geocoder = SimulatedGeocoder::new(config.places.clone());
        geocoder.set_offline(config.geocoder_offline);

        Self {
            platform: Arc::new(SimulatedPlatform::new(config.providers.clone())),
            settings: Arc::new(settings),
            geocoder: Arc::new(geocoder),
        }
    }

    /// Replay `route` forever, one fix every `interval`.
    ///
    /// Fixes from providers that are disabled or have no listener go nowhere,
    /// like real hardware that is switched off.
    pub fn spawn_route(&self, route: Vec<RoutePoint>, interval: Duration) -> Option<JoinHandle<()>> {
        if route.is_empty() {
            return None;
        }

        let platform = self.platform.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for point in route.iter().cycle() {
                ticker.tick().await;
                let delivered = platform.push_location(point.to_sample());
                if delivered > 0 {
                    debug!(
                        "Replayed fix {:.6}/{:.6} from {} to {} listeners",
                        point.latitude, point.longitude, point.provider, delivered
                    );
                } else {
                    trace!("Fix from {} had no listeners", point.provider);
                }
            }
        }))
    }
}
