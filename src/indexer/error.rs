use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("indexer pool busy")]
    Busy,
    #[error("repository does not exist")]
    NotExist,
    #[error("a non-expired index task already exists for this commit")]
    TaskExists,
    #[error("internal indexer error: {0}")]
    Internal(String),
}
