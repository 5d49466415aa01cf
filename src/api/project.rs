//! Façade over [`crate::project::ProjectService`]: projects pin one
//! repository at one commit for one owner, and annotations hang off
//! `(project, file, line)` with the latest-annotation rollup.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractors::{AppState, AuthenticatedUser, OptionalUser};
use crate::error::ApiError;
use crate::models::{LatestAnnotation, Project};
use crate::project::ProjectInfo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(new_project))
        .route("/:owner/:name", get(project_info))
        .route("/:pid/annotations", get(get_annotations).post(add_annotation))
        .route("/:pid/annotations/lines", get(annotation_lines))
        .route("/:pid/latest", get(latest_annotations))
}

#[derive(Debug, Deserialize)]
struct NewProjectRequest {
    url: String,
    hash: String,
    name: String,
    branch: bool,
}

async fn new_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<NewProjectRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.project_service.new_project(user.claims.id, &req.url, &req.hash, &req.name, req.branch).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn list_projects(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.project_service.list_projects(user.claims.id).await?))
}

#[derive(Debug, Deserialize)]
struct ProjectInfoQuery {
    url: String,
}

async fn project_info(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<ProjectInfoQuery>,
) -> Result<Json<ProjectInfo>, ApiError> {
    let owner_uid = state.account_service.lookup(&owner).await?;
    let requester_uid = user.map(|u| u.claims.id).unwrap_or_else(Uuid::nil);
    Ok(Json(state.project_service.project_info(requester_uid, owner_uid, &q.url, &name).await?))
}

#[derive(Debug, Deserialize)]
struct AddAnnotationRequest {
    file: String,
    text: String,
    line: i32,
}

async fn add_annotation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(pid): Path<Uuid>,
    Json(req): Json<AddAnnotationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.project_service.add_annotation(pid, user.claims.id, &req.file, &req.text, req.line).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    file: String,
}

async fn annotation_lines(
    State(state): State<AppState>,
    Path(pid): Path<Uuid>,
    Query(q): Query<FileQuery>,
) -> Result<Json<Vec<i32>>, ApiError> {
    Ok(Json(state.project_service.annotation_lines(pid, &q.file).await?))
}

#[derive(Debug, Deserialize)]
struct AnnotationsQuery {
    file: String,
    line: i32,
}

#[derive(Debug, Serialize)]
struct AnnotationView {
    uid: Uuid,
    name: String,
    text: String,
    #[serde(rename = "createdAt")]
    created_at: chrono::DateTime<chrono::Utc>,
}

async fn get_annotations(
    State(state): State<AppState>,
    Path(pid): Path<Uuid>,
    Query(q): Query<AnnotationsQuery>,
) -> Result<Json<Vec<AnnotationView>>, ApiError> {
    let records = state.project_service.annotations(pid, &q.file, q.line).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|r| AnnotationView { uid: r.record.uid, name: r.name, text: r.record.text, created_at: r.record.created_at })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct ParentQuery {
    parent: String,
}

async fn latest_annotations(
    State(state): State<AppState>,
    Path(pid): Path<Uuid>,
    Query(q): Query<ParentQuery>,
) -> Result<Json<Vec<LatestAnnotation>>, ApiError> {
    Ok(Json(state.project_service.latest_annotations(pid, &q.parent).await?))
}
