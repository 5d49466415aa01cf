use serde::{Deserialize, Serialize};

/// Result of extracting a single file at a commit.
///
/// `plain = false` means the content was classified binary (a NUL byte in
/// the first 1024 bytes, or total output over 256 KiB); `content` is then
/// always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Blob {
    pub content: String,
    pub plain: bool,
    pub synced: bool,
}

impl Blob {
    pub fn binary() -> Self {
        Self { content: String::new(), plain: false, synced: true }
    }

    pub fn plain(content: String) -> Self {
        Self { content, plain: true, synced: true }
    }

    pub fn unsynced() -> Self {
        Self { content: String::new(), plain: false, synced: false }
    }
}
