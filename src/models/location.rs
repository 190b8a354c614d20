use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

/// Acknowledgment returned for every accepted position sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAck {
    pub request_id: Uuid,
    pub point: GeoPoint,
    pub distance_km: f64,
    pub eta_min: f64,
    pub samples: usize,
}
