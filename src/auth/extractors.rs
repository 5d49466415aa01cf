use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use crate::account::AccountService;
use crate::auth::{claims::TokenClaims, errors::AuthError, jwt::JwtService};
use crate::config::AppConfig;
use crate::database::Database;
use crate::git::GitWorker;
use crate::indexer::Indexer;
use crate::project::ProjectService;
use crate::repo_cache::RepoCache;
use crate::repositories::{AccountRepository, IndexRepository, ProjectRepository, RepoCacheRepository};

/// Shared application state. Every subsystem is wired once in `main` and
/// handed to handlers behind an `Arc` so the concurrency primitives each
/// owns (semaphores, in-flight maps) are process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub git: Arc<GitWorker>,
    pub indexer: Arc<Indexer<IndexRepository>>,
    /// Same backing table the indexer writes to, held separately so read
    /// queries (`IndexStatus`, `SearchSymbol`) don't need a trait object
    /// over [`crate::indexer::SymbolStore`].
    pub index_repo: Arc<IndexRepository>,
    pub repo_cache: Arc<RepoCache<RepoCacheRepository>>,
    pub project_service: Arc<ProjectService<ProjectRepository, AccountRepository>>,
    pub account_service: Arc<AccountService<AccountRepository>>,
    pub jwt_service: JwtService,
    pub config: AppConfig,
}

/// A request whose `JWTToken` cookie decoded to valid, unexpired claims.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: TokenClaims,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(state.config.auth.cookie_name.as_str())
            .map(|c| c.value().to_string())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.jwt_service.decode_token(&token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(AuthenticatedUser { claims })
    }
}

/// Succeeds with `None` rather than rejecting when no (or an invalid)
/// token is present, for endpoints that are readable anonymously but
/// behave differently for their owner (e.g. project info's `can_annotate`).
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}
