use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo;
use crate::models::location::{LocationAck, LocationSample};
use crate::models::request::{GeoPoint, ServiceRequest};

/// Append-only position histories, one per request's active assignment.
/// Histories are kept for the life of the process for audit/replay; this
/// component never trims them.
pub struct LocationTracker {
    histories: DashMap<Uuid, Vec<LocationSample>>,
    average_speed_kmh: f64,
}

impl LocationTracker {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self {
            histories: DashMap::new(),
            average_speed_kmh,
        }
    }

    /// Append a sample and recompute straight-line distance/ETA toward the
    /// dropoff (or the pickup while none is set). The caller has already
    /// verified the provider binding and the active status.
    pub fn record(&self, request: &ServiceRequest, point: GeoPoint) -> LocationAck {
        let mut history = self.histories.entry(request.id).or_default();
        history.push(LocationSample {
            point,
            recorded_at: Utc::now(),
        });

        let destination = request.dropoff.unwrap_or(request.pickup);
        let distance_km = geo::haversine_km(&point, &destination);

        LocationAck {
            request_id: request.id,
            point,
            distance_km,
            eta_min: geo::eta_min(distance_km, self.average_speed_kmh),
            samples: history.len(),
        }
    }

    pub fn history(&self, request_id: Uuid) -> Vec<LocationSample> {
        self.histories
            .get(&request_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
