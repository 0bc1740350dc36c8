use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;

/// Failures surfaced by the thread sync engine to its view.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("thread view closed")]
    Closed,
}

impl SyncError {
    /// Whether the same call may succeed if the user retries it.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::Status { status, .. } => *status == 429 || *status >= 500,
            SyncError::Decode(_) | SyncError::Closed => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SyncError::Decode(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}

// In-process backends report storage failures as their HTTP equivalents.
impl From<RepoError> for SyncError {
    fn from(e: RepoError) -> Self {
        let status = match e {
            RepoError::NotFound => 404,
            RepoError::InvalidCursor => 400,
            RepoError::Internal(_) => 500,
        };
        SyncError::Status { status, body: e.to_string() }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("bad request")] BadRequest,
    #[error("forbidden")] Forbidden,
    #[error("not found")] NotFound,
    #[error("too many requests")] TooManyRequests,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::InvalidCursor => ApiError::BadRequest,
            RepoError::Internal(msg) => {
                log::error!("repository failure: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpResponse::build(status).json(ApiErrorBody { error: self.to_string() })
    }
}
