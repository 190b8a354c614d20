use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Requested,
    Accepted,
    Arrived,
    Started,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// An active request binds its provider until it reaches a terminal status.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Accepted | Self::Arrived | Self::Started)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// One dispatch unit: a requester's need for a provider, from creation
/// through completion or cancellation. Never deleted; terminal records
/// stay behind as audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub pickup: GeoPoint,
    pub dropoff: Option<GeoPoint>,
    pub current_point: Option<GeoPoint>,
    pub status: RequestStatus,
    pub fare: Option<f64>,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn new(
        requester_id: Uuid,
        pickup: GeoPoint,
        dropoff: Option<GeoPoint>,
        fare: Option<f64>,
        distance_km: Option<f64>,
        duration_min: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            provider_id: None,
            pickup,
            dropoff,
            current_point: None,
            status: RequestStatus::Requested,
            fare,
            distance_km,
            duration_min,
            cancelled_by: None,
            cancellation_reason: None,
            rating: None,
            feedback: None,
            created_at: Utc::now(),
            accepted_at: None,
            arrived_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_party(&self, caller: Uuid) -> bool {
        self.requester_id == caller || self.provider_id == Some(caller)
    }
}
