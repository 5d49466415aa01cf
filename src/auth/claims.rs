use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Carried in the `JWTToken` cookie per spec §6. `created_at` mirrors the
/// account's own `created_at`, not the token's issue time — it lets a
/// client show "member since" without a second round trip.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub exp: i64,
    pub iat: i64,
}

impl TokenClaims {
    pub fn new(id: Uuid, name: String, created_at: DateTime<Utc>, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self { id, name, created_at, exp: (now + expires_in).timestamp(), iat: now.timestamp() }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}
