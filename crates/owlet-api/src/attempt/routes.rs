use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use uuid::Uuid;

use crate::{ApiState, auth::AuthUser, error::ApiError};

use super::model::{
    AttemptOutcome, AttemptStarted, StartAttemptRequest, SubmitAnswersRequest,
    SubmitAnswersResponse,
};
use super::service::AttemptService;

/// Create the attempt routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/attempts", post(start_attempt))
        .route("/attempts/{attempt_id}/answers", post(submit_answers))
        .route("/attempts/{attempt_id}/finish", post(finish_attempt))
}

async fn start_attempt(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptStarted>), ApiError> {
    let started = AttemptService::from_state(&state)
        .start(auth_user.account_id, payload.lesson_id, payload.child_id)
        .await?;

    Ok((StatusCode::CREATED, Json(started)))
}

async fn submit_answers(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<Json<SubmitAnswersResponse>, ApiError> {
    let outcome = AttemptService::from_state(&state)
        .submit_answers(auth_user.account_id, attempt_id, payload.answers)
        .await?;

    Ok(Json(outcome))
}

async fn finish_attempt(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<AttemptOutcome>, ApiError> {
    let outcome = AttemptService::from_state(&state)
        .finish(auth_user.account_id, attempt_id)
        .await?;

    Ok(Json(outcome))
}
