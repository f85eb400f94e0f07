use serde::{Deserialize, Serialize};

use crate::models::{PullRequest, PullRequestShort, Team, User, UserWithTeam};

// -- Teams --

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: Team,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    #[serde(default)]
    pub team_name: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct SetUserActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserWithTeam,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewQueueResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

// -- Pull requests --

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergePrRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignReviewerRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrResponse {
    pub pr: PullRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReassignResponse {
    pub pr: PullRequest,
    pub replaced_by: String,
}

// -- Errors --

/// Discrete, caller-visible error kinds. The wire name is the serde name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    TeamExists,
    PrExists,
    PrMerged,
    NotAssigned,
    NoCandidate,
    NotFound,
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}
