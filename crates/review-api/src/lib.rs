pub mod error;
pub mod pull_requests;
pub mod state;
pub mod teams;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/team/add", post(teams::add_team))
        .route("/team/get", get(teams::get_team))
        .route("/users/setIsActive", post(users::set_is_active))
        .route("/users/getReview", get(users::get_review))
        .route("/pullRequest/create", post(pull_requests::create))
        .route("/pullRequest/merge", post(pull_requests::merge))
        .route("/pullRequest/reassign", post(pull_requests::reassign))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
