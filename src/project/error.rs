use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("repository url invalid")]
    InvalidUrl,
    #[error("project already exists")]
    AlreadyExists,
    #[error("project not found")]
    NotFound,
    #[error("internal project error: {0}")]
    Internal(String),
}
