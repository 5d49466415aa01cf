use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("already syncing")]
    InSync,
    #[error("syncer busy")]
    Busy,
    #[error("repository not found")]
    NotFound,
    #[error("internal sync error: {0}")]
    Internal(String),
}
