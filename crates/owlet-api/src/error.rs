use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use owlet_db::store::StoreError;

/// The error taxonomy surfaced to callers. NotFound, Auth and Validation
/// stay distinct all the way to the response; everything else collapses
/// into a generic "operation failed" with the details kept in the logs.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Auth(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Auth(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired credentials".to_string(),
            ),
            Self::Store(err) => {
                tracing::error!(error = %err, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "operation failed".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
