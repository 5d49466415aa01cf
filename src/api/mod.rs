pub mod auth;
pub mod git;
pub mod index;
pub mod project;
pub mod repositories;

use crate::auth::extractors::AppState;
use anyhow::Result;
use axum::{routing::get, Router};

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/status", get(status_handler))
        .nest("/auth", auth::router())
        .nest("/git", git::router())
        .nest("/index", index::router())
        .nest("/projects", project::router())
        .nest("/repositories", repositories::router());

    Ok(router)
}

async fn status_handler() -> &'static str {
    "API is running"
}
