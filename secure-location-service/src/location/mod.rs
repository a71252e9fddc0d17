// ============ Owner task state ============
mod engine;
mod event;

// ============ Components ============
pub mod cache;
pub mod geocode;
pub mod mock;
pub mod scheduler;
pub mod selector;
pub mod service;
pub mod staleness;

// ============ Public API ============
pub use cache::{CacheOutcome, LocationCache};
pub use engine::LocationEngine;
pub use geocode::{resolve_best_match, GeocodeDispatcher};
pub use mock::{MockLocationDetector, MOCK_LOCATION_SETTING};
pub use scheduler::UpdateScheduler;
pub use selector::{ListenerRole, ProviderSelector, Selection};
pub use service::{SecureLocationService, ServiceHandle};
pub use staleness::{is_stale, StalenessPolicy};
