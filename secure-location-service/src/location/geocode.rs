use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use secure_location_common::{AddressResult, LocationSample};

use crate::error::GeocodeError;
use crate::platform::Geocoder;

use super::event::ServiceEvent;

/// Resolve the best address for `sample`, falling back to a coordinates-only
/// address when the geocoder fails or has nothing.
pub fn resolve_best_match(geocoder: &dyn Geocoder, sample: &LocationSample) -> AddressResult {
    let (latitude, longitude) = (sample.latitude, sample.longitude);

    let result = if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        Err(GeocodeError::InvalidCoordinates {
            latitude,
            longitude,
        })
    } else {
        geocoder
            .from_location(latitude, longitude, 1)
            .and_then(|matches| matches.into_iter().next().ok_or(GeocodeError::NoResults))
    };

    match result {
        Ok(mut best) => {
            // Report the coordinates we asked about, not the geocoder's reference point
            best.latitude = latitude;
            best.longitude = longitude;
            best
        }
        Err(e) => {
            warn!(
                "Failed to geocode location {:.6}/{:.6}, minimal address will be used: {}",
                latitude, longitude, e
            );
            AddressResult::minimal(latitude, longitude)
        }
    }
}

/// Runs reverse geocoding off the owner task and posts the result back to it.
#[derive(Clone)]
pub struct GeocodeDispatcher {
    geocoder: Arc<dyn Geocoder>,
    tx: UnboundedSender<ServiceEvent>,
}

impl GeocodeDispatcher {
    pub(crate) fn new(geocoder: Arc<dyn Geocoder>, tx: UnboundedSender<ServiceEvent>) -> Self {
        Self { geocoder, tx }
    }

    /// Single attempt, no cancellation. The result is delivered even if a newer
    /// sample has been cached in the meantime.
    pub fn resolve(&self, sample: &LocationSample) {
        let geocoder = self.geocoder.clone();
        let tx = self.tx.clone();
        let sample = sample.clone();

        tokio::spawn(async move {
            let resolved =
                tokio::task::spawn_blocking(move || resolve_best_match(geocoder.as_ref(), &sample)).await;

            match resolved {
                Ok(address) => {
                    if tx.send(ServiceEvent::AddressResolved(address)).is_err() {
                        debug!("Geocode result dropped, service is gone");
                    }
                }
                Err(e) => warn!("Geocode worker failed: {}", e),
            }
        });
    }
}
