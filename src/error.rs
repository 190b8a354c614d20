use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("request already taken")]
    AlreadyTaken,

    #[error("provider already holds an active request")]
    AlreadyAssigned,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DispatchError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            DispatchError::NotAuthorized(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            DispatchError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            DispatchError::AlreadyTaken => {
                (StatusCode::CONFLICT, "request already taken".to_string())
            }
            DispatchError::AlreadyAssigned => (
                StatusCode::CONFLICT,
                "provider already holds an active request".to_string(),
            ),
            DispatchError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            DispatchError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
