use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{ApiState, auth::AuthUser, error::ApiError};

use super::model::{GradeRequest, GradeResponse, QueueParams, ReviewQueueResponse};
use super::service::ReviewService;

/// Create the review routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/reviews/queue", get(get_queue))
        .route("/reviews/{question_id}/grade", post(grade_item))
}

async fn get_queue(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Query(params): Query<QueueParams>,
) -> Result<Json<ReviewQueueResponse>, ApiError> {
    let queue = ReviewService::from_state(&state)
        .queue(auth_user.account_id, params.child_id, params.limit)
        .await?;

    Ok(Json(queue))
}

async fn grade_item(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<GradeResponse>, ApiError> {
    let outcome = ReviewService::from_state(&state)
        .grade(
            auth_user.account_id,
            payload.child_id,
            question_id,
            payload.grade,
        )
        .await?;

    Ok(Json(outcome))
}
