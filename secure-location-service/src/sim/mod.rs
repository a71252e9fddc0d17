// ============ Simulated device (in-memory platform, settings, geocoder) ============
mod device;
mod geocoder;
mod platform;
mod settings;

pub use device::{RoutePoint, SimulatedDevice};
pub use geocoder::{haversine_m, KnownPlace, SimulatedGeocoder};
pub use platform::{Registration, SimulatedPlatform};
pub use settings::SimulatedSettings;
