//! Service index and health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use utoipa::OpenApi;

use crate::schemas::system::{HealthResponse, RootResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_root, get_health),
    components(schemas(RootResponse, HealthResponse))
)]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
}

/// Service banner with the list of endpoints.
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses((status = 200, description = "Service index", body = RootResponse))
)]
pub async fn get_root(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    let mut endpoints: Vec<String> = [
        "GET /health",
        "POST /chat",
        "GET /history/{user_id}",
        "POST /save/{user_id}",
        "GET /suggest/{user_id}",
        "GET /download/code",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect();
    if state.config.enable_auth {
        endpoints.push("POST /auth/register".into());
        endpoints.push("POST /auth/login".into());
    }
    Json(RootResponse {
        message: "codemate coding assistant API".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        endpoints,
    })
}

/// Heartbeat with model and database availability.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Server is healthy", body = HealthResponse))
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now(),
        model_loaded: state.orchestrator.model_loaded(),
        database_connected: state.database_connected(),
    })
}
