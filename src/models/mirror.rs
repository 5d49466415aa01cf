use serde::{Deserialize, Serialize};

/// Observable clone state of a [`RepoUrl`](super::repo_url::RepoUrl)'s mirror.
///
/// `Cloning` additionally carries the last meaningful progress line seen
/// from `git clone --progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CloneStatus {
    Unknown,
    Cloning { progress: String },
    Cloned,
}
