use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use review_core::ReviewError;
use review_types::api::{ErrorCode, ErrorResponse};

/// Error half of every handler: a status code plus the JSON error envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: ErrorCode::Internal,
            message: "internal server error".into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidInput | ErrorCode::TeamExists => StatusCode::BAD_REQUEST,
        ErrorCode::PrExists
        | ErrorCode::PrMerged
        | ErrorCode::NotAssigned
        | ErrorCode::NoCandidate => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        if let ReviewError::Store(e) = &err {
            // Never leak storage details to the client
            error!("Store failure: {:#}", e);
            return Self::internal();
        }

        let code = err.code();
        Self {
            status: status_for(code),
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: ErrorCode::InvalidInput,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.code, self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_keep_their_message() {
        let err: ApiError = ReviewError::PrMerged("pr-1".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), ErrorCode::PrMerged);
        assert_eq!(err.message, "cannot reassign on merged pull request pr-1");
    }

    #[test]
    fn store_errors_are_opaque() {
        let err: ApiError = ReviewError::Store(anyhow::anyhow!("database is locked")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn team_exists_is_a_bad_request() {
        assert_eq!(status_for(ErrorCode::TeamExists), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    }
}
