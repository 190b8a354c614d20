use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::presence::PresenceRecord;
use crate::models::request::GeoPoint;

/// Explicit online/offline flags, one record per provider. No heartbeats:
/// a provider is online exactly as long as it says it is.
pub struct PresenceRegistry {
    records: DashMap<Uuid, PresenceRecord>,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn set_online(
        &self,
        provider_id: Uuid,
        is_online: bool,
        location: Option<GeoPoint>,
    ) -> PresenceRecord {
        let mut entry = self
            .records
            .entry(provider_id)
            .or_insert_with(|| PresenceRecord {
                provider_id,
                is_online: false,
                last_known_point: None,
                updated_at: Utc::now(),
            });

        entry.is_online = is_online;
        if location.is_some() {
            entry.last_known_point = location;
        }
        entry.updated_at = Utc::now();
        entry.clone()
    }

    pub fn get(&self, provider_id: Uuid) -> Option<PresenceRecord> {
        self.records
            .get(&provider_id)
            .map(|entry| entry.value().clone())
    }

    /// A provider with no record has never gone online.
    pub fn is_online(&self, provider_id: Uuid) -> bool {
        self.records
            .get(&provider_id)
            .map(|entry| entry.is_online)
            .unwrap_or(false)
    }

    pub fn online_providers(&self) -> Vec<Uuid> {
        self.records
            .iter()
            .filter(|entry| entry.is_online)
            .map(|entry| entry.provider_id)
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.records.iter().filter(|entry| entry.is_online).count()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::PresenceRegistry;
    use crate::models::request::GeoPoint;

    #[test]
    fn unknown_provider_is_offline() {
        let registry = PresenceRegistry::new();
        assert!(!registry.is_online(Uuid::new_v4()));
    }

    #[test]
    fn toggle_is_explicit_and_idempotent() {
        let registry = PresenceRegistry::new();
        let provider = Uuid::new_v4();

        registry.set_online(provider, true, None);
        assert!(registry.is_online(provider));
        registry.set_online(provider, true, None);
        assert!(registry.is_online(provider));

        registry.set_online(provider, false, None);
        assert!(!registry.is_online(provider));
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn last_known_point_survives_offline_toggle() {
        let registry = PresenceRegistry::new();
        let provider = Uuid::new_v4();
        let point = GeoPoint {
            lat: 28.6139,
            lng: 77.2090,
        };

        registry.set_online(provider, true, Some(point));
        registry.set_online(provider, false, None);

        let record = registry.get(provider).unwrap();
        assert!(!record.is_online);
        assert_eq!(record.last_known_point, Some(point));
    }

    #[test]
    fn online_providers_lists_only_online() {
        let registry = PresenceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.set_online(a, true, None);
        registry.set_online(b, false, None);

        let online = registry.online_providers();
        assert_eq!(online, vec![a]);
    }
}
