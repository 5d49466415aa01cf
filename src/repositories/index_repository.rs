use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;

use crate::indexer::{IndexerError, SymbolStore};
use crate::models::{IndexTask, SymbolEntry, SymbolResult};

pub struct IndexRepository {
    pool: PgPool,
    task_timeout: Duration,
}

impl IndexRepository {
    pub fn new(pool: PgPool, task_timeout: Duration) -> Self {
        Self { pool, task_timeout }
    }

    /// Direct store query backing the `SearchSymbol` RPC: symbols whose
    /// name matches exactly, scoped to a single `(url, hash)`.
    pub async fn search_symbol(&self, url: &str, hash: &str, name: &str) -> Result<Vec<SymbolResult>, IndexerError> {
        let rows = sqlx::query_as::<_, SymbolEntry>(
            "SELECT url, hash, file, name, pattern, language, line_number, line, line_before, line_after, kind, scope, scope_kind \
             FROM file_indexes WHERE url = $1 AND hash = $2 AND name = $3 ORDER BY file, line_number",
        )
        .bind(url)
        .bind(hash)
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows
            .into_iter()
            .map(|r| SymbolResult {
                url: r.url,
                hash: r.hash,
                file: r.file,
                name: r.name,
                language: r.language,
                line_number: r.line_number,
                line: r.line,
                kind: r.kind,
                score: 1.0,
            })
            .collect())
    }
}

fn internal(err: sqlx::Error) -> IndexerError {
    IndexerError::Internal(err.to_string())
}

/// Backing query for the `IndexStatus` RPC: whether a task row exists
/// for `(url, hash)` and, if so, whether it has already succeeded.
pub struct TaskStatus {
    pub exists: bool,
    pub success: bool,
}

impl IndexRepository {
    pub async fn task_status(&self, url: &str, hash: &str) -> Result<TaskStatus, IndexerError> {
        let task = sqlx::query_as::<_, IndexTask>(
            "SELECT url, hash, created_at, success FROM tasks WHERE url = $1 AND hash = $2",
        )
        .bind(url)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        Ok(match task {
            Some(task) => TaskStatus { exists: true, success: task.success },
            None => TaskStatus { exists: false, success: false },
        })
    }
}

#[async_trait]
impl SymbolStore for IndexRepository {
    async fn repository_indexed(&self, url: &str, hash: &str) -> Result<bool, IndexerError> {
        sqlx::query_scalar("SELECT success FROM tasks WHERE url = $1 AND hash = $2")
            .bind(url)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)
            .map(|row: Option<bool>| row.unwrap_or(false))
    }

    async fn file_indexed(&self, url: &str, hash: &str, file: &str) -> Result<bool, IndexerError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM indexed_files WHERE url = $1 AND hash = $2 AND file = $3)")
            .bind(url)
            .bind(hash)
            .bind(file)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)
    }

    async fn mark_indexed(&self, url: &str, hash: &str, file: &str) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO indexed_files (url, hash, file) VALUES ($1, $2, $3) ON CONFLICT (url, hash, file) DO NOTHING",
        )
        .bind(url)
        .bind(hash)
        .bind(file)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn add_entries(&self, entries: Vec<SymbolEntry>) -> Result<(), IndexerError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(internal)?;

        for entry in &entries {
            sqlx::query(
                "INSERT INTO file_indexes \
                 (url, hash, file, name, pattern, language, line_number, line, line_before, line_after, kind, scope, scope_kind) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(&entry.url)
            .bind(&entry.hash)
            .bind(&entry.file)
            .bind(&entry.name)
            .bind(&entry.pattern)
            .bind(&entry.language)
            .bind(entry.line_number)
            .bind(&entry.line)
            .bind(&entry.line_before)
            .bind(&entry.line_after)
            .bind(&entry.kind)
            .bind(&entry.scope)
            .bind(&entry.scope_kind)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        }

        tx.commit().await.map_err(internal)
    }

    async fn set_task_state(&self, url: &str, hash: &str, success: bool) -> Result<(), IndexerError> {
        sqlx::query("UPDATE tasks SET success = $1 WHERE url = $2 AND hash = $3")
            .bind(success)
            .bind(url)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn new_index_task(&self, url: &str, hash: &str) -> Result<(), IndexerError> {
        let existing = sqlx::query_as::<_, IndexTask>("SELECT url, hash, created_at, success FROM tasks WHERE url = $1 AND hash = $2")
            .bind(url)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        if let Some(task) = existing {
            if !task.is_expired(self.task_timeout) {
                return Err(IndexerError::TaskExists);
            }
        }

        sqlx::query(
            "INSERT INTO tasks (url, hash, created_at, success) VALUES ($1, $2, now(), false) \
             ON CONFLICT (url, hash) DO UPDATE SET created_at = now(), success = false",
        )
        .bind(url)
        .bind(hash)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }
}
