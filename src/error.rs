//! Single place translating every domain error into the §7 HTTP envelope.
//!
//! Each RPC-shaped boundary (the `api` handlers) converts a domain error
//! enum into [`ApiError`] via `From`; callers elsewhere keep using the
//! concrete `thiserror` types so matching stays precise internally.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::account::AccountError;
use crate::git::GitError;
use crate::indexer::IndexerError;
use crate::project::ProjectError;
use crate::repo_cache::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainCode {
    BadRequest,
    Unauthorized,
    NotFound,
    ServiceUnavailable,
    Internal,
}

impl DomainCode {
    fn status(self) -> StatusCode {
        match self {
            DomainCode::BadRequest => StatusCode::BAD_REQUEST,
            DomainCode::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainCode::NotFound => StatusCode::NOT_FOUND,
            DomainCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            DomainCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: DomainCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: u16,
    message: String,
}

impl ApiError {
    pub fn new(code: DomainCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(DomainCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(DomainCode::BadRequest, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        (status, Json(ErrorEnvelope { code: status.as_u16(), message: self.message })).into_response()
    }
}

impl From<GitError> for ApiError {
    fn from(err: GitError) -> Self {
        let code = match err {
            GitError::Busy | GitError::Cloning => DomainCode::ServiceUnavailable,
            GitError::Cloned => DomainCode::BadRequest,
            GitError::NotExist | GitError::NotFound => DomainCode::NotFound,
            GitError::InvalidUrl => DomainCode::BadRequest,
            GitError::Internal(_) => DomainCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let code = match err {
            SyncError::InSync | SyncError::Busy => DomainCode::ServiceUnavailable,
            SyncError::NotFound => DomainCode::NotFound,
            SyncError::Internal(_) => DomainCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        let code = match err {
            IndexerError::Busy | IndexerError::TaskExists => DomainCode::ServiceUnavailable,
            IndexerError::NotExist => DomainCode::NotFound,
            IndexerError::Internal(_) => DomainCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        let code = match err {
            ProjectError::InvalidUrl => DomainCode::BadRequest,
            ProjectError::AlreadyExists => DomainCode::BadRequest,
            ProjectError::NotFound => DomainCode::NotFound,
            ProjectError::Internal(_) => DomainCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        let code = match err {
            AccountError::AlreadyExists => DomainCode::BadRequest,
            AccountError::NotFound | AccountError::InvalidCredentials => DomainCode::Unauthorized,
            AccountError::Internal(_) => DomainCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}
