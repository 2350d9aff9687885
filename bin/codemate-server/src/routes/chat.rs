//! One conversation turn per request.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router, middleware};
use codemate_core::{ChatRequest, ChatResponse};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{Caller, ValidatedJson, ValidatedQuery};
use crate::middleware::RouteGroup;
use crate::middleware::rate_limit::rate_limit;
use crate::schemas::chat::{ChatBody, ChatQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatBody, ChatResponse)))]
pub struct ChatApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route_layer(middleware::from_fn_with_state(
            (state, RouteGroup::Chat),
            rate_limit,
        ))
}

/// Runs one turn. Always answers, falling back to a canned response when
/// the model is unavailable.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    params(ChatQuery),
    request_body = ChatBody,
    responses(
        (status = 200, description = "Assistant answer", body = ChatResponse),
        (status = 401, description = "Invalid or missing token"),
        (status = 422, description = "Invalid request"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ValidatedQuery(query): ValidatedQuery<ChatQuery>,
    ValidatedJson(body): ValidatedJson<ChatBody>,
) -> Result<Json<ChatResponse>, ServerError> {
    let user_id = caller.user_id(query.user_id.as_deref()).map(str::to_owned);
    let request = ChatRequest::from(body);
    debug!(
        user_id = user_id.as_deref().unwrap_or("anonymous"),
        skill_level = %request.skill_level,
        message_len = request.message.len(),
        "chat turn"
    );

    let response = state.orchestrator.process(user_id.as_deref(), &request).await;

    if let Some(block) = response.code_blocks.last() {
        state
            .recent_code
            .insert(caller.code_key(user_id.as_deref()), block.clone());
    }
    Ok(Json(response))
}
