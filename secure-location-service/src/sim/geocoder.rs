use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use secure_location_common::AddressResult;

use crate::error::GeocodeError;
use crate::platform::Geocoder;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn default_radius_m() -> f64 {
    1_000.0
}

/// Address the simulated geocoder returns for coordinates within `radius_m`
/// of the address's own coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownPlace {
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,
    pub address: AddressResult,
}

/// Great-circle distance in meters
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Offline geocoder over a fixed list of places
pub struct SimulatedGeocoder {
    places: Vec<KnownPlace>,
    offline: AtomicBool,
    lookups: AtomicUsize,
}

impl SimulatedGeocoder {
    pub fn new(places: Vec<KnownPlace>) -> Self {
        Self {
            places,
            offline: AtomicBool::new(false),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Make lookups fail with an I/O error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of lookups performed so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Geocoder for SimulatedGeocoder {
    fn from_location(
        &self,
        latitude: f64,
        longitude: f64,
        max_results: usize,
    ) -> Result<Vec<AddressResult>, GeocodeError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(GeocodeError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "geocoder service unavailable",
            )));
        }

        let mut matches: Vec<(f64, &KnownPlace)> = self
            .places
            .iter()
            .map(|place| {
                let distance = haversine_m(
                    latitude,
                    longitude,
                    place.address.latitude,
                    place.address.longitude,
                );
                (distance, place)
            })
            .filter(|(distance, place)| *distance <= place.radius_m)
            .collect();
        matches.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(matches
            .into_iter()
            .take(max_results)
            .map(|(_, place)| place.address.clone())
            .collect())
    }
}
