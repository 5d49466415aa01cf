use thiserror::Error;

/// Outcome of a [`GitWorker`](super::worker::GitWorker) operation.
///
/// Mirrors the taxonomy in spec §4.1/§7: busy/in-flight states are not
/// failures, they are "ask again later" signals and are kept distinct
/// from `Internal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("clone pool busy")]
    Busy,
    #[error("repository already cloning")]
    Cloning,
    #[error("repository already cloned")]
    Cloned,
    #[error("repository does not exist")]
    NotExist,
    #[error("file not found")]
    NotFound,
    #[error("invalid repository url")]
    InvalidUrl,
    #[error("internal git error: {0}")]
    Internal(String),
}
