//! Thin JSON façade over [`crate::git::GitWorker`]. Gateway-level code is
//! explicitly out of deep scope (spec §1, §4.5) — this just translates
//! query params into worker calls and worker errors into [`ApiError`].

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::extractors::AppState;
use crate::error::ApiError;
use crate::models::tree::normalize_query_path;
use crate::models::{CloneStatus, NamedCommit, RepoUrl};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clone", post(clone))
        .route("/status", get(status))
        .route("/refs", get(refs))
        .route("/tree", get(tree))
        .route("/blob", get(blob))
        .route("/archive", get(archive))
}

#[derive(Debug, Deserialize)]
struct CloneRequest {
    url: String,
}

async fn clone(State(state): State<AppState>, Json(req): Json<CloneRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let url = RepoUrl::normalize(&req.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    state.git.clone(url).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    progress: Option<String>,
}

async fn status(State(state): State<AppState>, Query(q): Query<UrlQuery>) -> Result<Json<StatusResponse>, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    let response = match state.git.status(&url).await {
        CloneStatus::Unknown => StatusResponse { status: "unknown", progress: None },
        CloneStatus::Cloning { progress } => StatusResponse { status: "cloning", progress: Some(progress) },
        CloneStatus::Cloned => StatusResponse { status: "cloned", progress: None },
    };
    Ok(Json(response))
}

async fn refs(State(state): State<AppState>, Query(q): Query<UrlQuery>) -> Result<Json<Vec<NamedCommit>>, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    Ok(Json(state.git.refs(&url).await?))
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    url: String,
    hash: String,
    #[serde(default)]
    path: String,
}

async fn tree(State(state): State<AppState>, Query(q): Query<TreeQuery>) -> Result<Response, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    let parent = normalize_query_path(&q.path);
    let entries: Vec<_> = state
        .git
        .tree(&url, &q.hash)
        .await?
        .into_iter()
        .filter(|e| crate::models::parent_dir_of(&e.file) == parent)
        .collect();
    Ok(Json(entries).into_response())
}

#[derive(Debug, Deserialize)]
struct BlobQuery {
    url: String,
    hash: String,
    file: String,
}

async fn blob(State(state): State<AppState>, Query(q): Query<BlobQuery>) -> Result<Response, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    let blob = state.git.blob(&url, &q.hash, &q.file).await?;
    Ok(Json(blob).into_response())
}

#[derive(Debug, Deserialize)]
struct ArchiveQuery {
    url: String,
    hash: String,
}

async fn archive(State(state): State<AppState>, Query(q): Query<ArchiveQuery>) -> Result<Response, ApiError> {
    let url = RepoUrl::normalize(&q.url).ok_or_else(|| ApiError::bad_request("invalid repository url"))?;
    let stream = state.git.archive(&url, &q.hash).await?;
    let body = axum::body::Body::from_stream(tokio_util::io::ReaderStream::new(stream));
    Ok(axum::http::Response::builder()
        .header("content-type", "application/x-tar")
        .body(body)
        .expect("static response builder never fails"))
}
