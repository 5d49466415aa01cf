use axum::{extract::State, response::Json, routing::post, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::extractors::{AppState, AuthenticatedUser};
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::models::Account> for AccountInfo {
    fn from(account: crate::models::Account) -> Self {
        Self { id: account.id, name: account.name, email: account.email, created_at: account.created_at }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", axum::routing::get(profile))
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AccountInfo>), ApiError> {
    req.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;

    let account = state.account_service.register(&req.name, &req.email, &req.password).await?;
    let jar = issue_cookie(&state, jar, &account)?;
    Ok((jar, Json(account.into())))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AccountInfo>), ApiError> {
    req.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;

    let account = state.account_service.verify(&req.name, &req.password).await?;
    let jar = issue_cookie(&state, jar, &account)?;
    Ok((jar, Json(account.into())))
}

async fn profile(auth_user: AuthenticatedUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": auth_user.claims.id,
        "name": auth_user.claims.name,
        "createdAt": auth_user.claims.created_at,
    }))
}

fn issue_cookie(state: &AppState, jar: CookieJar, account: &crate::models::Account) -> Result<CookieJar, ApiError> {
    let token = state
        .jwt_service
        .create_token_for_account(account.id, account.name.clone(), account.created_at)
        .map_err(|e| ApiError::new(crate::error::DomainCode::Internal, e.to_string()))?;

    let cookie = Cookie::build((state.config.auth.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .build();

    Ok(jar.add(cookie))
}
