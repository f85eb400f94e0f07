use review_types::api::ErrorCode;
use thiserror::Error;

/// Caller-visible outcome of a failed engine operation.
///
/// Business-rule violations each have their own variant; anything the store
/// raises is carried opaquely in `Store`.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("team {0} already exists")]
    TeamExists(String),

    #[error("pull request {0} already exists")]
    PrExists(String),

    #[error("cannot reassign on merged pull request {0}")]
    PrMerged(String),

    #[error("reviewer {reviewer_id} is not assigned to pull request {pull_request_id}")]
    NotAssigned {
        pull_request_id: String,
        reviewer_id: String,
    },

    #[error("no eligible reviewer candidate for pull request {0}")]
    NoCandidate(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ReviewResult<T> = Result<T, ReviewError>;

impl ReviewError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::TeamExists(_) => ErrorCode::TeamExists,
            Self::PrExists(_) => ErrorCode::PrExists,
            Self::PrMerged(_) => ErrorCode::PrMerged,
            Self::NotAssigned { .. } => ErrorCode::NotAssigned,
            Self::NoCandidate(_) => ErrorCode::NoCandidate,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Store(_) => ErrorCode::Internal,
        }
    }
}

/// Rejects empty or whitespace-only required fields.
pub(crate) fn require(field: &str, value: &str) -> ReviewResult<()> {
    if value.trim().is_empty() {
        return Err(ReviewError::InvalidInput(format!("{} cannot be empty", field)));
    }
    Ok(())
}
