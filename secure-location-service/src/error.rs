use thiserror::Error;

/// Errors reported by the location platform when registering listeners
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unknown location provider: {0}")]
    UnknownProvider(String),
}

/// Errors reported by a reverse geocoder
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("coordinates out of range: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("geocoder returned no results")]
    NoResults,
}

/// Errors surfaced to clients holding a [`crate::location::ServiceHandle`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("secure location service is not running")]
    Stopped,
}
