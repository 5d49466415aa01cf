//! Façade over [`crate::repo_cache::RepoCache`] — the read-through cache
//! the Gateway's directory/blob views actually poll. Every route can
//! answer 503 (`IN_SYNC`) per spec §6; clients are expected to retry.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::auth::extractors::AppState;
use crate::error::ApiError;
use crate::models::RepoUrl;
use crate::repo_cache::CacheOutcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/commits", get(named_commits))
        .route("/directory", get(directory))
        .route("/blob", get(blob))
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: String,
}

async fn named_commits(State(state): State<AppState>, Query(q): Query<UrlQuery>) -> Result<Response, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    match state.repo_cache.named_commits(&url).await? {
        CacheOutcome::Ready(commits) => Ok(Json(commits).into_response()),
        CacheOutcome::InSync => Ok(in_sync()),
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryQuery {
    url: String,
    hash: String,
    #[serde(default)]
    path: String,
}

async fn directory(State(state): State<AppState>, Query(q): Query<DirectoryQuery>) -> Result<Response, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    match state.repo_cache.directories(&url, &q.hash, &q.path).await? {
        CacheOutcome::Ready(entries) => Ok(Json(entries).into_response()),
        CacheOutcome::InSync => Ok(in_sync()),
    }
}

#[derive(Debug, Deserialize)]
struct BlobQuery {
    url: String,
    hash: String,
    path: String,
}

async fn blob(State(state): State<AppState>, Query(q): Query<BlobQuery>) -> Result<Response, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    match state.repo_cache.blob(&url, &q.hash, &q.path).await? {
        CacheOutcome::Ready(blob) => Ok(Json(blob).into_response()),
        CacheOutcome::InSync => Ok(in_sync()),
    }
}

fn in_sync() -> Response {
    ApiError::new(crate::error::DomainCode::ServiceUnavailable, "not yet synced, retry").into_response()
}
