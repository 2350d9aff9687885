//! Account registration and login.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use codemate_core::StoreError;
use tracing::info;
use utoipa::OpenApi;

use crate::entities::UserStore;
use crate::error::ServerError;
use crate::extract::ValidatedJson;
use crate::schemas::auth::{LoginBody, RegisterBody, TokenResponse};
use crate::security::{hash_password, verify_password};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(OpenApi)]
#[openapi(
    paths(register, login),
    components(schemas(RegisterBody, LoginBody, TokenResponse))
)]
pub struct AuthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

fn users(state: &AppState) -> Result<&Arc<dyn UserStore>, ServerError> {
    state
        .users
        .as_ref()
        .ok_or_else(|| ServerError::ServiceUnavailable("database not connected".into()))
}

fn token_response(state: &AppState, username: &str, user_id: String) -> Result<Json<TokenResponse>, ServerError> {
    Ok(Json(TokenResponse {
        access_token: state.tokens.issue(username, &user_id)?,
        token_type: "bearer".into(),
        user_id,
    }))
}

/// Creates an account and returns an access token for it.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterBody,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Invalid username or password format"),
        (status = 503, description = "Database not connected"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RegisterBody>,
) -> Result<Json<TokenResponse>, ServerError> {
    let users = users(&state)?;
    if users.find_user(&body.username).await?.is_some() {
        return Err(ServerError::Conflict("username already taken".into()));
    }
    let password_hash = hash_password(body.password, state.config.bcrypt_cost).await?;
    let user = users
        .create_user(&body.username, &password_hash)
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration.
            StoreError::Conflict(_) => ServerError::Conflict("username already taken".into()),
            other => other.into(),
        })?;
    users.ensure_profile(&user.user_id).await?;
    info!(user_id = %user.user_id, username = %user.username, "user registered");
    token_response(&state, &user.username, user.user_id.clone())
}

/// Exchanges credentials for an access token.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginBody,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Bad credentials"),
        (status = 503, description = "Database not connected"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<LoginBody>,
) -> Result<Json<TokenResponse>, ServerError> {
    let users = users(&state)?;
    let Some(user) = users.find_user(&body.username).await? else {
        return Err(ServerError::Unauthorized(BAD_CREDENTIALS.into()));
    };
    if !verify_password(body.password, user.password_hash.clone()).await? {
        return Err(ServerError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    info!(user_id = %user.user_id, "user logged in");
    token_response(&state, &user.username, user.user_id)
}
