use serde::{Deserialize, Serialize};

/// A `(name, hash, branch|tag)` triple derived from `git show-ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NamedCommit {
    pub name: String,
    pub hash: String,
    pub branch: bool,
}
