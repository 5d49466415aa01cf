use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{parent_dir_of, Blob, DirectoryEntry, NamedCommit};
use crate::repo_cache::{RepoCacheRead, RepoCacheStore, SyncError};

pub struct RepoCacheRepository {
    pool: PgPool,
}

impl RepoCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(err: sqlx::Error) -> SyncError {
    SyncError::Internal(err.to_string())
}

#[async_trait]
impl RepoCacheStore for RepoCacheRepository {
    async fn set_named_commits(&self, url: &str, commits: Vec<NamedCommit>) -> Result<(), SyncError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        sqlx::query("DELETE FROM named_commits WHERE url = $1")
            .bind(url)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        for commit in &commits {
            sqlx::query("INSERT INTO named_commits (url, name, hash, branch) VALUES ($1, $2, $3, $4)")
                .bind(url)
                .bind(&commit.name)
                .bind(&commit.hash)
                .bind(commit.branch)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
        }

        tx.commit().await.map_err(internal)
    }

    /// Persists the full recursive tree for `(url, hash)`, inserting the
    /// root sentinel so a later read can tell "synced, empty" from "not
    /// yet synced". Every regular file in the listing also gets an
    /// unsynced [`Blob`] placeholder row, since a blob is otherwise only
    /// ever created as a side effect of a tree sync (per spec §4.3).
    async fn set_directories(&self, url: &str, hash: &str, mut entries: Vec<DirectoryEntry>) -> Result<(), SyncError> {
        entries.push(DirectoryEntry::root_sentinel());
        let mut tx = self.pool.begin().await.map_err(internal)?;

        for entry in &entries {
            // The sentinel has no meaningful parent; `parent_dir_of("/")`
            // would read it as a file named "/" at the filesystem root,
            // which is never a valid query path, so it's harmless either way.
            let parent_dir = if entry.is_root_sentinel() { String::new() } else { parent_dir_of(&entry.file) };
            sqlx::query(
                "INSERT INTO directory_entries (url, hash, file, parent_dir, dir) VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (url, hash, file) DO NOTHING",
            )
            .bind(url)
            .bind(hash)
            .bind(&entry.file)
            .bind(&parent_dir)
            .bind(entry.dir)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

            if !entry.dir {
                sqlx::query(
                    "INSERT INTO blobs (url, hash, file, content, plain, synced) VALUES ($1, $2, $3, '', false, false) \
                     ON CONFLICT (url, hash, file) DO NOTHING",
                )
                .bind(url)
                .bind(hash)
                .bind(&entry.file)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            }
        }

        tx.commit().await.map_err(internal)
    }

    async fn set_blob(&self, url: &str, hash: &str, file: &str, blob: Blob) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO blobs (url, hash, file, content, plain, synced) VALUES ($1, $2, $3, $4, $5, true) \
             ON CONFLICT (url, hash, file) DO UPDATE SET content = $4, plain = $5, synced = true",
        )
        .bind(url)
        .bind(hash)
        .bind(file)
        .bind(&blob.content)
        .bind(blob.plain)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }
}

#[async_trait]
impl RepoCacheRead for RepoCacheRepository {
    async fn get_named_commits(&self, url: &str) -> Result<Option<Vec<NamedCommit>>, SyncError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM named_commits WHERE url = $1)")
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        if !exists {
            return Ok(None);
        }
        let commits = sqlx::query_as::<_, NamedCommit>("SELECT name, hash, branch FROM named_commits WHERE url = $1 ORDER BY name")
            .bind(url)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(Some(commits))
    }

    async fn get_directories(&self, url: &str, hash: &str, parent: &str) -> Result<Option<Vec<DirectoryEntry>>, SyncError> {
        let entries = sqlx::query_as::<_, DirectoryEntry>(
            "SELECT file, dir FROM directory_entries WHERE url = $1 AND hash = $2 AND parent_dir = $3 ORDER BY file",
        )
        .bind(url)
        .bind(hash)
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        if !entries.is_empty() {
            return Ok(Some(entries));
        }

        // No direct children under `parent` — distinguish "tree never
        // synced" from "synced, this directory is simply empty" by
        // checking for the root sentinel written once per (url, hash).
        let synced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM directory_entries WHERE url = $1 AND hash = $2 AND file = '/')",
        )
        .bind(url)
        .bind(hash)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        Ok(synced.then(Vec::new))
    }

    async fn get_blob(&self, url: &str, hash: &str, file: &str) -> Result<Option<Blob>, SyncError> {
        sqlx::query_as::<_, Blob>("SELECT content, plain, synced FROM blobs WHERE url = $1 AND hash = $2 AND file = $3")
            .bind(url)
            .bind(hash)
            .bind(file)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)
    }
}
