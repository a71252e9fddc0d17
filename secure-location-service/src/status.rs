use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use secure_location_common::{AddressResult, LocationSample};

use crate::location::ServiceHandle;

const NOT_AVAILABLE: &str = "N/A";

fn or_na<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Point-in-time view of the service, as shown by the demo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub connected: bool,
    pub mock_location_enabled: bool,
    pub providers_enabled: bool,
    pub address: Option<AddressResult>,
    pub location: Option<LocationSample>,
}

impl StatusReport {
    pub async fn collect(handle: &ServiceHandle) -> Self {
        let location = handle.cached_location().await;
        let address = handle.cached_address().await;

        Self {
            connected: location.is_ok() && address.is_ok(),
            mock_location_enabled: handle.is_mock_location_enabled(),
            providers_enabled: handle.are_providers_enabled(),
            address: address.ok().flatten(),
            location: location.ok().flatten(),
        }
    }

    pub fn service_status(&self) -> &'static str {
        if self.connected {
            "Connected to secure location service"
        } else {
            "Not connected to secure location service"
        }
    }

    pub fn mock_location_status(&self) -> &'static str {
        if self.mock_location_enabled {
            "Mock location is ENABLED, locations are not trusted"
        } else {
            "Mock location is disabled"
        }
    }

    /// Label/value rows for the cached address, then the cached location.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![("Cached address", String::new())];
        match &self.address {
            None => rows.push(("Not available", NOT_AVAILABLE.to_string())),
            Some(address) => {
                let lines = if address.address_lines.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    address.address_lines.join("\n")
                };
                rows.push(("Address", lines));
                rows.push(("Feature", or_na(address.feature_name.as_deref())));
                rows.push(("Admin area", or_na(address.admin_area.as_deref())));
                rows.push(("Sub-admin area", or_na(address.sub_admin_area.as_deref())));
                rows.push(("Locality", or_na(address.locality.as_deref())));
                rows.push(("Thoroughfare", or_na(address.thoroughfare.as_deref())));
                rows.push(("Postal code", or_na(address.postal_code.as_deref())));
                rows.push(("Country code", or_na(address.country_code.as_deref())));
                rows.push(("Country", or_na(address.country_name.as_deref())));
                rows.push(("Latitude", address.latitude.to_string()));
                rows.push(("Longitude", address.longitude.to_string()));
                rows.push(("Phone", or_na(address.phone.as_deref())));
                rows.push(("URL", or_na(address.url.as_deref())));
            }
        }

        rows.push(("Cached location", String::new()));
        match &self.location {
            None => rows.push(("Not available", NOT_AVAILABLE.to_string())),
            Some(location) => {
                rows.push(("Provider", location.provider.clone()));
                rows.push(("Time", location.timestamp.to_rfc3339()));
                rows.push(("Latitude", location.latitude.to_string()));
                rows.push(("Longitude", location.longitude.to_string()));
                rows.push(("Accuracy", or_na(location.accuracy)));
                rows.push(("Altitude", or_na(location.altitude)));
                rows.push(("Bearing", or_na(location.bearing)));
                rows.push(("Speed", or_na(location.speed)));
            }
        }

        rows
    }

    pub fn log(&self) {
        info!("{} / {}", self.service_status(), self.mock_location_status());
        if !self.providers_enabled {
            warn!("No location provider is enabled, turn on location to get updates");
        }
        for (label, value) in self.rows() {
            if value.is_empty() {
                info!("-- {} --", label);
            } else {
                info!("{:>16}: {}", label, value);
            }
        }
    }
}

/// Log the full status on every cache change and every `interval`.
pub fn spawn_status_reporter(handle: ServiceHandle, interval: Duration) -> JoinHandle<()> {
    let mut events = handle.subscribe();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => info!("Service event: {}", event.to_json()),
                    Err(RecvError::Lagged(skipped)) => warn!("Status reporter skipped {} events", skipped),
                    Err(RecvError::Closed) => break,
                },
                _ = ticker.tick() => {}
            }

            let report = StatusReport::collect(&handle).await;
            report.log();
            if !report.connected {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_rows_without_data() {
        let report = StatusReport::default();
        let rows = report.rows();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], ("Not available", "N/A".to_string()));
        assert_eq!(report.service_status(), "Not connected to secure location service");
    }

    #[test]
    fn test_rows_with_data() {
        let location = LocationSample::new("gps", 53.5, 9.9, Utc::now())
            .with_accuracy(12.5)
            .with_bearing(90.0)
            .with_speed(3.0);
        let report = StatusReport {
            connected: true,
            mock_location_enabled: true,
            providers_enabled: true,
            address: Some(AddressResult {
                address_lines: vec!["Flughafenstr. 1".to_string(), "22335 Hamburg".to_string()],
                locality: Some("Hamburg".to_string()),
                ..AddressResult::minimal(53.5, 9.9)
            }),
            location: Some(location),
        };

        let rows = report.rows();
        let value = |label: &str| {
            rows.iter()
                .find(|(l, _)| *l == label)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(value("Address"), "Flughafenstr. 1\n22335 Hamburg");
        assert_eq!(value("Locality"), "Hamburg");
        assert_eq!(value("Postal code"), "N/A");
        assert_eq!(value("Provider"), "gps");
        assert_eq!(value("Accuracy"), "12.5");
        assert_eq!(value("Altitude"), "N/A");
        assert_eq!(value("Bearing"), "90");
        assert_eq!(value("Speed"), "3");
        assert!(report.mock_location_status().contains("ENABLED"));
    }

    #[test]
    fn test_coordinates_only_address_row() {
        let report = StatusReport {
            connected: true,
            address: Some(AddressResult::minimal(1.0, 2.0)),
            location: Some(LocationSample::new("network", 1.0, 2.0, Utc::now()).with_altitude(12.0)),
            ..Default::default()
        };

        let rows = report.rows();
        assert!(rows.contains(&("Address", "N/A".to_string())));
        assert!(rows.contains(&("Latitude", "1".to_string())));
        assert!(rows.contains(&("Altitude", "12".to_string())));
        // Only the two section headers carry an empty value
        assert_eq!(rows.iter().filter(|(_, value)| value.is_empty()).count(), 2);
    }
}
