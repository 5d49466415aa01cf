use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized "latest annotation under this directory" rollup.
///
/// Uniqueness key: `(pid, parent, sub)`. Written once per ancestor
/// directory of an annotated file every time [`Annotation`](super::annotation::Annotation)
/// is inserted, so a directory listing can show its most recently
/// annotated child with a single point query.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LatestAnnotation {
    pub pid: Uuid,
    pub parent: String,
    pub sub: String,
    pub file: String,
    pub brief: String,
    pub line_number: i32,
    pub timestamp: DateTime<Utc>,
}

/// First 64 *bytes* of `text`, snapped back to the nearest char boundary
/// so the result is always valid UTF-8.
pub fn brief_of(text: &str) -> String {
    if text.len() <= 64 {
        return text.to_string();
    }
    let mut end = 64;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn briefs_short_text_unchanged() {
        assert_eq!(brief_of("hello"), "hello");
    }

    #[test]
    fn briefs_long_text_to_64_bytes() {
        let text = "hello world".repeat(20);
        let brief = brief_of(&text);
        assert_eq!(brief.len(), 64);
        assert_eq!(brief, &text[..64]);
    }

    #[test]
    fn briefs_never_split_a_multibyte_char() {
        // 64 bytes into this string lands mid-character; the helper must
        // back off to the previous boundary instead of panicking.
        let text = "é".repeat(40);
        let brief = brief_of(&text);
        assert!(text.is_char_boundary(brief.len()));
        assert!(brief.len() <= 64);
    }
}
