use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::account::{AccountError, AccountStore};
use crate::models::{Account, AccountBasicInfo};

pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(err: sqlx::Error) -> AccountError {
    AccountError::Internal(err.to_string())
}

#[async_trait]
impl AccountStore for AccountRepository {
    async fn find_by_name_or_email(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, name, email, password_hash, created_at FROM accounts WHERE name = $1 OR email = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AccountError> {
        sqlx::query_as::<_, Account>("SELECT id, name, email, password_hash, created_at FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)
    }

    async fn basic_info(&self, ids: &[Uuid]) -> Result<Vec<AccountBasicInfo>, AccountError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, AccountBasicInfo>("SELECT id, name FROM accounts WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)
    }

    async fn insert(&self, name: &str, email: &str, password_hash: &str) -> Result<Account, AccountError> {
        sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (id, name, email, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, email, password_hash, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => AccountError::AlreadyExists,
            _ => internal(err),
        })
    }
}
