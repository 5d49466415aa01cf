//! Façade over [`crate::indexer::Indexer`]: queue a commit for symbol
//! extraction, poll whether it finished, and search the symbols it wrote.

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::extractors::AppState;
use crate::error::ApiError;
use crate::models::{RepoUrl, SymbolResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(index_repository))
        .route("/status", get(index_status))
        .route("/search", get(search_symbol))
}

#[derive(Debug, Deserialize)]
struct IndexRequest {
    url: String,
    hash: String,
}

/// Mirrors the original `IndexRepository` RPC: returns `indexed: true`
/// immediately if the commit was already indexed; otherwise admits a
/// background pass (subject to the indexer's busy/duplicate rules) and
/// reports `indexed: false`. Callers poll `/status` for completion.
async fn index_repository(State(state): State<AppState>, Json(req): Json<IndexRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let url = RepoUrl::normalize(&req.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    let indexed = state.indexer.request_indexing(url, req.hash).await;
    Ok(Json(serde_json::json!({ "indexed": indexed })))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    url: String,
    hash: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    exists: bool,
    success: bool,
}

async fn index_status(State(state): State<AppState>, Query(q): Query<StatusQuery>) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.index_repo.task_status(&q.url, &q.hash).await?;
    Ok(Json(StatusResponse { exists: status.exists, success: status.success }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    url: String,
    hash: String,
    symbol: String,
}

async fn search_symbol(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> Result<Json<Vec<SymbolResult>>, ApiError> {
    Ok(Json(state.index_repo.search_symbol(&q.url, &q.hash, &q.symbol).await?))
}
