use tokio::sync::oneshot;

use secure_location_common::{AddressResult, LocationSample};

use crate::platform::ListenerId;

/// Work item for the service's owner task.
///
/// Platform callbacks, timers, geocode completions and client requests all
/// arrive here so that service state is only touched from one task.
#[derive(Debug)]
pub(crate) enum ServiceEvent {
    LocationChanged {
        listener: ListenerId,
        sample: LocationSample,
    },
    ProviderEnabled {
        listener: ListenerId,
        provider: String,
    },
    ProviderDisabled {
        listener: ListenerId,
        provider: String,
    },
    SettingsChanged,
    UpdateDue {
        generation: u64,
    },
    AddressResolved(AddressResult),
    Query(Query),
    Stop(oneshot::Sender<()>),
}

/// Client reads answered by the owner task
#[derive(Debug)]
pub(crate) enum Query {
    CachedLocation(oneshot::Sender<Option<LocationSample>>),
    CachedAddress(oneshot::Sender<Option<AddressResult>>),
    ProvidersUntrusted(oneshot::Sender<bool>),
}
