use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::presence::PresenceRecord;
use crate::models::request::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/providers/:id/presence",
        patch(set_presence).get(get_presence),
    )
    .route("/providers/online", get(list_online))
}

#[derive(Deserialize)]
pub struct SetPresenceBody {
    pub online: bool,
    pub location: Option<GeoPoint>,
}

async fn set_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetPresenceBody>,
) -> Result<Json<PresenceRecord>, DispatchError> {
    if let Some(point) = &body.location {
        if !point.is_valid() {
            return Err(DispatchError::Validation(
                "coordinates out of range".to_string(),
            ));
        }
    }

    let record = state.presence.set_online(id, body.online, body.location);
    Ok(Json(record))
}

async fn get_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PresenceRecord>, DispatchError> {
    let record = state
        .presence
        .get(id)
        .ok_or_else(|| DispatchError::NotFound(format!("provider {id} has no presence record")))?;
    Ok(Json(record))
}

async fn list_online(State(state): State<Arc<AppState>>) -> Json<Vec<Uuid>> {
    Json(state.presence.online_providers())
}
