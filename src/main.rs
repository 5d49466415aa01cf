mod account;
mod api;
mod auth;
mod config;
mod database;
mod error;
mod git;
mod indexer;
mod models;
mod project;
mod repo_cache;
mod repositories;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use account::AccountService;
use anyhow::Result;
use auth::extractors::AppState;
use auth::jwt::JwtService;
use axum::{routing::get, Router};
use config::AppConfig;
use database::Database;
use git::GitWorker;
use indexer::Indexer;
use project::ProjectService;
use repo_cache::RepoCache;
use repositories::{AccountRepository, IndexRepository, ProjectRepository, RepoCacheRepository};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "klask_rs=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new()?;
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    info!("Starting Klask-RS annotation platform on {}", bind_address);

    let database = match Database::new(&config.database.url, config.database.max_connections).await {
        Ok(db) => {
            info!("Database connected successfully");
            db
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e);
        }
    };

    let jwt_service = JwtService::new(&config.auth)?;
    info!("JWT service initialized successfully");

    let git = Arc::new(
        GitWorker::new(
            PathBuf::from(&config.git.data_dir),
            config.git.clone_concurrency,
            config.git.archive_concurrency,
            config.git.other_concurrency,
            Duration::from_secs(config.git.clone_timeout_secs),
            Duration::from_secs(config.git.other_timeout_secs),
            Duration::from_secs(config.git.archive_timeout_secs),
        )
        .await?,
    );
    info!(data_dir = %config.git.data_dir, "git worker initialized successfully");

    let index_repo = Arc::new(IndexRepository::new(
        database.pool().clone(),
        chrono::Duration::seconds(config.indexer.timeout_secs as i64),
    ));
    let indexer = Arc::new(
        Indexer::new(
            &config.indexer.ctags_path,
            config.indexer.pool_size,
            config.indexer.max_file_size,
            Duration::from_secs(config.indexer.timeout_secs),
            git.clone(),
            index_repo.clone(),
        )
        .await?,
    );
    info!(pool_size = config.indexer.pool_size, "indexer initialized successfully");

    let repo_cache_repo = Arc::new(RepoCacheRepository::new(database.pool().clone()));
    let repo_cache = Arc::new(RepoCache::new(
        repo_cache_repo,
        git.clone(),
        config.sync.concurrency,
        Duration::from_secs(config.sync.timeout_secs),
    ));
    info!("repo cache initialized successfully");

    let account_repo = Arc::new(AccountRepository::new(database.pool().clone()));
    let account_service = Arc::new(AccountService::new(account_repo));

    let project_repo = Arc::new(ProjectRepository::new(database.pool().clone()));
    let project_service = Arc::new(ProjectService::new(
        project_repo,
        account_service.clone(),
        Arc::new(indexer.clone()) as Arc<dyn project::IndexRequester>,
    ));
    info!("project service initialized successfully");

    let app_state = AppState {
        database,
        git,
        indexer,
        index_repo,
        repo_cache,
        project_service,
        account_service,
        jwt_service,
        config: config.clone(),
    };

    let app = create_app(app_state).await?;

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn create_app(app_state: AppState) -> Result<Router> {
    let app = Router::new()
        .route("/", get(root_handler))
        .route(
            "/health",
            get({
                let db = app_state.database.clone();
                move || health_handler(db)
            }),
        )
        .nest("/api", api::create_router().await?)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Ok(app)
}

async fn root_handler() -> &'static str {
    "Klask-RS: code annotation platform"
}

async fn health_handler(database: Database) -> &'static str {
    match database.health_check().await {
        Ok(_) => "OK",
        Err(_) => "Database connection failed",
    }
}
