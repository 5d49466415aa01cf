use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's annotation project over a single repository at a single commit.
///
/// Uniqueness key: `(owner_uid, url, name)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner_uid: Uuid,
    pub url: String,
    pub hash: String,
    pub name: String,
    pub branch: bool,
    pub indexed: bool,
    pub created_at: DateTime<Utc>,
}
