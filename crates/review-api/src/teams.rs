use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use review_types::api::{CreateTeamRequest, TeamQuery, TeamResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// POST /team/add: create a team and upsert its members.
pub async fn add_team(
    State(state): State<AppState>,
    payload: Result<Json<CreateTeamRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let team = run_blocking(&state, move |svc| {
        svc.create_team(&req.team_name, &req.members)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name=
pub async fn get_team(
    State(state): State<AppState>,
    Query(query): Query<TeamQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let team = run_blocking(&state, move |svc| svc.get_team(&query.team_name)).await?;
    Ok(Json(team))
}
