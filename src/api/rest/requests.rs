use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::dispatch;
use crate::error::DispatchError;
use crate::models::location::LocationAck;
use crate::models::request::{GeoPoint, RequestStatus, ServiceRequest};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request))
        .route("/requests/open", get(list_open))
        .route("/requests/active", get(get_active))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/status", patch(update_status))
        .route("/requests/:id/location", patch(update_location))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/requests/:id/rating", post(rate_request))
}

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub requester_id: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: Option<GeoPoint>,
    pub fare: Option<f64>,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
}

#[derive(Deserialize)]
pub struct OpenQuery {
    pub provider_id: Uuid,
}

#[derive(Serialize)]
pub struct OpenResponse {
    pub offline_warning: bool,
    pub requests: Vec<ServiceRequest>,
}

#[derive(Deserialize)]
pub struct ActiveQuery {
    pub requester_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct AcceptBody {
    pub provider_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub caller_id: Uuid,
    pub status: RequestStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationBody {
    pub provider_id: Uuid,
    pub point: GeoPoint,
}

#[derive(Deserialize)]
pub struct CancelBody {
    pub caller_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RatingBody {
    pub requester_id: Uuid,
    pub rating: u8,
    pub feedback: Option<String>,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<ServiceRequest>, DispatchError> {
    let request = dispatch::create(
        &state,
        dispatch::CreateRequest {
            requester_id: body.requester_id,
            pickup: body.pickup,
            dropoff: body.dropoff,
            fare: body.fare,
            distance_km: body.distance_km,
            duration_min: body.duration_min,
        },
    )?;
    Ok(Json(request))
}

async fn list_open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenQuery>,
) -> Json<OpenResponse> {
    let listing = dispatch::list_open(&state, query.provider_id);
    Json(OpenResponse {
        offline_warning: listing.offline_warning,
        requests: listing.requests,
    })
}

async fn get_active(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Option<ServiceRequest>>, DispatchError> {
    let active = match (query.requester_id, query.provider_id) {
        (Some(requester_id), None) => dispatch::active_for_requester(&state, requester_id),
        (None, Some(provider_id)) => dispatch::active_for_provider(&state, provider_id),
        _ => {
            return Err(DispatchError::Validation(
                "pass exactly one of requester_id or provider_id".to_string(),
            ))
        }
    };
    Ok(Json(active))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, DispatchError> {
    let request = state
        .store
        .get(id)
        .ok_or_else(|| DispatchError::NotFound(format!("request {id} not found")))?;
    Ok(Json(request))
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AcceptBody>,
) -> Result<Json<ServiceRequest>, DispatchError> {
    let request = dispatch::accept(&state, id, body.provider_id)?;
    Ok(Json(request))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<ServiceRequest>, DispatchError> {
    let request = dispatch::update_status(&state, id, body.caller_id, body.status)?;
    Ok(Json(request))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateLocationBody>,
) -> Result<Json<LocationAck>, DispatchError> {
    let ack = dispatch::update_location(&state, id, body.provider_id, body.point)?;
    Ok(Json(ack))
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<ServiceRequest>, DispatchError> {
    let request = dispatch::cancel(&state, id, body.caller_id, body.reason)?;
    Ok(Json(request))
}

async fn rate_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RatingBody>,
) -> Result<Json<ServiceRequest>, DispatchError> {
    let request = dispatch::rate(&state, id, body.requester_id, body.rating, body.feedback)?;
    Ok(Json(request))
}
