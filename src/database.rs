use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

#[cfg(any(test, debug_assertions))]
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
#[cfg(any(test, debug_assertions))]
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Test database using SQLite in-memory, schema hand-maintained alongside
// migrations/0001_init.sql since sqlx::migrate! targets Postgres only.
#[cfg(any(test, debug_assertions))]
#[allow(dead_code)]
static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[cfg(any(test, debug_assertions))]
#[allow(dead_code)]
pub struct TestDatabase {
    pool: Pool<Sqlite>,
}

#[cfg(any(test, debug_assertions))]
impl TestDatabase {
    #[allow(dead_code)]
    pub async fn new() -> Result<Self> {
        let pool = create_test_database().await?;
        Ok(Self { pool })
    }

    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    #[allow(dead_code)]
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(any(test, debug_assertions))]
#[allow(dead_code)]
pub async fn create_test_database() -> Result<Pool<Sqlite>> {
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_name = format!("file:test_db_{}?mode=memory&cache=shared", counter);

    let pool = SqlitePoolOptions::new()
        .max_connections(1) // SQLite in-memory works best with single connection
        .connect(&db_name)
        .await?;

    setup_test_schema(&pool).await?;

    Ok(pool)
}

#[cfg(any(test, debug_assertions))]
#[allow(dead_code)]
async fn setup_test_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS named_commits (
            url TEXT NOT NULL,
            name TEXT NOT NULL,
            hash TEXT NOT NULL,
            branch BOOLEAN NOT NULL,
            PRIMARY KEY (url, name)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS directory_entries (
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            file TEXT NOT NULL,
            parent_dir TEXT NOT NULL,
            dir BOOLEAN NOT NULL,
            PRIMARY KEY (url, hash, file)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS directory_entries_by_parent ON directory_entries (url, hash, parent_dir);")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blobs (
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            file TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            plain BOOLEAN NOT NULL DEFAULT 0,
            synced BOOLEAN NOT NULL DEFAULT 0,
            PRIMARY KEY (url, hash, file)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            owner_uid TEXT NOT NULL,
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            name TEXT NOT NULL,
            branch BOOLEAN NOT NULL,
            indexed BOOLEAN NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (owner_uid, url, name)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotations (
            id TEXT PRIMARY KEY,
            pid TEXT NOT NULL,
            uid TEXT NOT NULL,
            file TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            annotation TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS latest_annotations (
            pid TEXT NOT NULL,
            parent TEXT NOT NULL,
            sub TEXT NOT NULL,
            file TEXT NOT NULL,
            brief TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            timestamp DATETIME NOT NULL,
            PRIMARY KEY (pid, parent, sub)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            success BOOLEAN NOT NULL DEFAULT 0,
            PRIMARY KEY (url, hash)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_indexes (
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            file TEXT NOT NULL,
            name TEXT NOT NULL,
            pattern TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            line_number INTEGER NOT NULL,
            line TEXT NOT NULL DEFAULT '',
            line_before TEXT NOT NULL DEFAULT '',
            line_after TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL DEFAULT '',
            scope TEXT NOT NULL DEFAULT '',
            scope_kind TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS file_indexes_lookup ON file_indexes (url, hash, name);")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexed_files (
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            file TEXT NOT NULL,
            PRIMARY KEY (url, hash, file)
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
