use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping row for a single indexing attempt over `(url, hash)`.
///
/// Uniqueness key: `(url, hash)`. A task is expired once
/// `now - created_at > timeout` and has not succeeded, which allows a new
/// attempt to be admitted for the same key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexTask {
    pub url: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub success: bool,
}

impl IndexTask {
    pub fn is_expired(&self, timeout: chrono::Duration) -> bool {
        !self.success && Utc::now() - self.created_at > timeout
    }
}
