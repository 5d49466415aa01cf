pub mod error;
pub mod process;
pub mod worker;

pub use error::GitError;
pub use worker::{ArchiveStream, GitWorker};
