use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single location fix reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    #[serde(default)]
    pub accuracy: Option<f32>,
    /// Altitude above WGS84 in meters
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Bearing in degrees
    #[serde(default)]
    pub bearing: Option<f32>,
    /// Speed in meters/second
    #[serde(default)]
    pub speed: Option<f32>,
    /// Name of the provider that produced this fix, e.g. "gps"
    pub provider: String,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(provider: impl Into<String>, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            altitude: None,
            bearing: None,
            speed: None,
            provider: provider.into(),
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, meters: f32) -> Self {
        self.accuracy = Some(meters);
        self
    }

    pub fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }

    pub fn with_bearing(mut self, degrees: f32) -> Self {
        self.bearing = Some(degrees);
        self
    }

    pub fn with_speed(mut self, meters_per_second: f32) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    /// Age of this fix relative to `now`. Negative for fixes from the future.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

/// Postal address resolved from a location fix.
///
/// A "minimal" address only carries the coordinates it was resolved from;
/// this is what callers see when the geocoder could not produce anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressResult {
    #[serde(default)]
    pub address_lines: Vec<String>,
    #[serde(default)]
    pub feature_name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub sub_admin_area: Option<String>,
    #[serde(default)]
    pub admin_area: Option<String>,
    #[serde(default)]
    pub thoroughfare: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Latitude this address was resolved from
    #[serde(default)]
    pub latitude: f64,
    /// Longitude this address was resolved from
    #[serde(default)]
    pub longitude: f64,
}

impl AddressResult {
    /// Coordinates-only address
    pub fn minimal(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.address_lines.is_empty()
            && self.feature_name.is_none()
            && self.locality.is_none()
            && self.sub_admin_area.is_none()
            && self.admin_area.is_none()
            && self.thoroughfare.is_none()
            && self.postal_code.is_none()
            && self.country_code.is_none()
            && self.country_name.is_none()
            && self.phone.is_none()
            && self.url.is_none()
    }

    /// Best single-line rendering for logs and status output
    pub fn summary(&self) -> String {
        if let Some(line) = self.address_lines.first() {
            return line.clone();
        }

        let parts: Vec<&str> = [&self.locality, &self.admin_area, &self.country_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();

        if parts.is_empty() {
            format!("{:.6}, {:.6}", self.latitude, self.longitude)
        } else {
            parts.join(", ")
        }
    }
}
