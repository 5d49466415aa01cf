use serde::{Deserialize, Serialize};

/// One ctags-derived symbol occurrence, enriched with the two lines of
/// context the [`Liner`](crate::indexer::liner::Liner) attaches around it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SymbolEntry {
    pub url: String,
    pub hash: String,
    pub file: String,
    pub name: String,
    pub pattern: String,
    pub language: String,
    pub line_number: i32,
    pub line: String,
    pub line_before: String,
    pub line_after: String,
    pub kind: String,
    pub scope: String,
    pub scope_kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolResult {
    pub url: String,
    pub hash: String,
    pub file: String,
    pub name: String,
    pub language: String,
    pub line_number: i32,
    pub line: String,
    pub kind: String,
    pub score: f32,
}
