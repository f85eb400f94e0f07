use std::sync::Arc;

use tracing::error;

use review_core::{ReviewResult, ReviewService};
use review_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: ReviewService<Database>,
}

impl AppStateInner {
    pub fn new(db: Database) -> AppState {
        Arc::new(Self {
            service: ReviewService::new(db),
        })
    }
}

/// Run a blocking engine call off the async runtime.
pub async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ReviewService<Database>) -> ReviewResult<T> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.service))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}
