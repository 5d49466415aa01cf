use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single line-anchored annotation. No uniqueness constraint: multiple
/// annotations on the same `(pid, file, line_number)` are allowed and
/// returned in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Annotation {
    pub pid: Uuid,
    pub uid: Uuid,
    pub file: String,
    pub line_number: i32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// An [`Annotation`] joined with the display name of its author, for
/// handing back to a client without a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub uid: Uuid,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
