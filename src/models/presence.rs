use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::GeoPoint;

/// A provider's explicit online/offline eligibility flag. Toggled by the
/// provider, never inferred from connection liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub provider_id: Uuid,
    pub is_online: bool,
    pub last_known_point: Option<GeoPoint>,
    pub updated_at: DateTime<Utc>,
}
