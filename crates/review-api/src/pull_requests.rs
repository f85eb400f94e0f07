use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use review_types::api::{
    CreatePrRequest, MergePrRequest, PrResponse, ReassignResponse, ReassignReviewerRequest,
};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// POST /pullRequest/create: open a PR and auto-assign reviewers.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let pr = run_blocking(&state, move |svc| {
        svc.create_pr(&req.pull_request_id, &req.pull_request_name, &req.author_id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(PrResponse { pr })))
}

/// POST /pullRequest/merge: idempotent.
pub async fn merge(
    State(state): State<AppState>,
    payload: Result<Json<MergePrRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let pr = run_blocking(&state, move |svc| svc.merge_pr(&req.pull_request_id)).await?;
    Ok(Json(PrResponse { pr }))
}

pub async fn reassign(
    State(state): State<AppState>,
    payload: Result<Json<ReassignReviewerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let result = run_blocking(&state, move |svc| {
        svc.reassign_reviewer(&req.pull_request_id, &req.old_user_id)
    })
    .await?;

    Ok(Json(ReassignResponse {
        pr: result.pr,
        replaced_by: result.replaced_by,
    }))
}
