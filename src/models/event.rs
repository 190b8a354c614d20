use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::LocationAck;
use crate::models::request::ServiceRequest;

/// Pub/sub address. Party topics carry events for one requester or provider;
/// the open pool carries availability of unassigned requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    OpenRequests,
    Party(Uuid),
}

/// Fan-out payloads. Delivery is fire-and-forget; the request store stays
/// the source of truth, so a dropped event is recoverable by re-polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DispatchEvent {
    #[serde(rename = "request.created")]
    RequestCreated { request: ServiceRequest },

    #[serde(rename = "request.accepted")]
    RequestAccepted { request: ServiceRequest },

    #[serde(rename = "request.unavailable")]
    RequestUnavailable { request_id: Uuid },

    #[serde(rename = "status.changed")]
    StatusChanged { request: ServiceRequest },

    #[serde(rename = "location.updated")]
    LocationUpdated { update: LocationAck },

    #[serde(rename = "request.cancelled")]
    RequestCancelled { request: ServiceRequest },
}
