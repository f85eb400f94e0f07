use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    response::IntoResponse,
};

use review_types::api::{ReviewQuery, ReviewQueueResponse, SetUserActiveRequest, UserResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn set_is_active(
    State(state): State<AppState>,
    payload: Result<Json<SetUserActiveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let user = run_blocking(&state, move |svc| {
        svc.set_user_active(&req.user_id, req.is_active)
    })
    .await?;

    Ok(Json(UserResponse { user }))
}

/// GET /users/getReview?user_id=: the user's review queue, newest first.
pub async fn get_review(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query.user_id;
    let lookup = user_id.clone();
    let pull_requests = run_blocking(&state, move |svc| svc.get_review_queue(&lookup)).await?;

    Ok(Json(ReviewQueueResponse {
        user_id,
        pull_requests,
    }))
}
