//! Account registry: the minimal external collaborator the rest of the
//! system treats as a lookup/verify service (register, login, and
//! resolving a set of ids to display names for annotation authorship).

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use uuid::Uuid;

use crate::account::error::AccountError;
use crate::models::{Account, AccountBasicInfo};

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_name_or_email(&self, identifier: &str) -> Result<Option<Account>, AccountError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AccountError>;
    async fn basic_info(&self, ids: &[Uuid]) -> Result<Vec<AccountBasicInfo>, AccountError>;
    async fn insert(&self, name: &str, email: &str, password_hash: &str) -> Result<Account, AccountError>;
}

pub struct AccountService<S: AccountStore> {
    store: Arc<S>,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Account, AccountError> {
        if self.store.find_by_name_or_email(name).await?.is_some()
            || self.store.find_by_name_or_email(email).await?.is_some()
        {
            return Err(AccountError::AlreadyExists);
        }
        let password_hash = hash_password(password)?;
        self.store.insert(name, email, &password_hash).await
    }

    /// Verifies credentials against either username or email, returning
    /// the matching account. All accounts are active from creation — the
    /// registry has no separate activation step.
    pub async fn verify(&self, identifier: &str, password: &str) -> Result<Account, AccountError> {
        let account = self.store.find_by_name_or_email(identifier).await?.ok_or(AccountError::InvalidCredentials)?;
        if !verify_password(password, &account.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }
        Ok(account)
    }

    pub async fn lookup(&self, name: &str) -> Result<Uuid, AccountError> {
        let account = self.store.find_by_name_or_email(name).await?.ok_or(AccountError::NotFound)?;
        Ok(account.id)
    }

    pub async fn basic_info(&self, ids: &[Uuid]) -> Result<Vec<AccountBasicInfo>, AccountError> {
        self.store.basic_info(ids).await
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AccountError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AccountError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AccountError::Internal(format!("bad password hash: {e}")))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}
