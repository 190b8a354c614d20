use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::observability::metrics::Metrics;
use crate::presence::PresenceRegistry;
use crate::store::RequestStore;
use crate::tracker::LocationTracker;

pub struct AppState {
    pub store: RequestStore,
    pub presence: PresenceRegistry,
    pub tracker: LocationTracker,
    pub broadcaster: Broadcaster,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            store: RequestStore::new(),
            presence: PresenceRegistry::new(),
            tracker: LocationTracker::new(config.average_speed_kmh),
            broadcaster: Broadcaster::new(config.event_buffer_size),
            metrics: Metrics::new(),
        }
    }
}
