use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The account registry is an external collaborator per the
/// specification (`lookup(name)->id`, `basicInfo(ids)->[{id,name}]`,
/// `verify(name|email,password)->info`); this is the minimal record
/// shape [`crate::account`] needs to satisfy that interface in-process.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountBasicInfo {
    pub id: Uuid,
    pub name: String,
}
