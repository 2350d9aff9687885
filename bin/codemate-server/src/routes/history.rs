//! Stored conversation read and bulk save.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use codemate_core::ChatMessage;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{Caller, ValidatedJson, ValidatedQuery, check_user_id};
use crate::middleware::RouteGroup;
use crate::middleware::rate_limit::rate_limit;
use crate::schemas::history::{
    DEFAULT_HISTORY_LIMIT, HistoryQuery, HistoryResponse, SaveBody, SaveResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_history, save_conversation),
    components(schemas(HistoryResponse, SaveBody, SaveResponse, ChatMessage))
)]
pub struct HistoryApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let history = Router::new()
        .route("/history/{user_id}", get(get_history))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), RouteGroup::History),
            rate_limit,
        ));
    let save = Router::new()
        .route("/save/{user_id}", post(save_conversation))
        .route_layer(middleware::from_fn_with_state(
            (state, RouteGroup::Save),
            rate_limit,
        ));
    history.merge(save)
}

/// Most recent messages of a user, oldest first. Unknown users get an empty
/// history.
#[utoipa::path(
    get,
    path = "/history/{user_id}",
    tag = "history",
    params(("user_id" = String, Path, description = "Conversation owner"), HistoryQuery),
    responses(
        (status = 200, description = "Conversation history", body = HistoryResponse),
        (status = 403, description = "Token belongs to another user"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ServerError> {
    check_user_id(&user_id)?;
    caller.ensure_owner(&user_id)?;

    let Some(store) = &state.conversations else {
        return Ok(Json(HistoryResponse {
            user_id,
            history: Vec::new(),
            database_connected: false,
        }));
    };
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = store.read_recent(&user_id, limit).await?;
    Ok(Json(HistoryResponse {
        user_id,
        history,
        database_connected: true,
    }))
}

/// Appends client-held messages to a user's conversation.
#[utoipa::path(
    post,
    path = "/save/{user_id}",
    tag = "history",
    params(("user_id" = String, Path, description = "Conversation owner")),
    request_body = SaveBody,
    responses(
        (status = 200, description = "Save outcome", body = SaveResponse),
        (status = 403, description = "Token belongs to another user"),
        (status = 422, description = "Invalid request"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn save_conversation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user_id): Path<String>,
    ValidatedJson(body): ValidatedJson<SaveBody>,
) -> Result<Json<SaveResponse>, ServerError> {
    check_user_id(&user_id)?;
    caller.ensure_owner(&user_id)?;

    let Some(store) = &state.conversations else {
        return Ok(Json(SaveResponse {
            saved: false,
            count: 0,
            error: Some("database not connected".into()),
        }));
    };
    let count = store
        .append_batch(&user_id, body.session_id.as_deref(), &body.messages)
        .await?;
    if let Some(users) = &state.users {
        users.ensure_profile(&user_id).await?;
    }
    info!(user_id = %user_id, count, "conversation saved");
    Ok(Json(SaveResponse {
        saved: true,
        count,
        error: None,
    }))
}
