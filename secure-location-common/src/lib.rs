pub mod criteria;
pub mod event;
pub mod types;

pub use criteria::{AccuracyClass, Criteria, PowerClass, ProviderProperties, PASSIVE_PROVIDER};
pub use event::CacheEvent;
pub use types::{AddressResult, LocationSample};
