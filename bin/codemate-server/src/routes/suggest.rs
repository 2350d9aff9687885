use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router, middleware};
use chrono::Utc;
use codemate_core::rules::{default_suggestions, topic_suggestions};
use codemate_core::{SkillLevel, SuggestionSet};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{Caller, check_user_id};
use crate::middleware::RouteGroup;
use crate::middleware::rate_limit::rate_limit;
use crate::schemas::suggest::SuggestResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_suggestions), components(schemas(SuggestResponse, SuggestionSet)))]
pub struct SuggestApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/suggest/{user_id}", get(get_suggestions))
        .route_layer(middleware::from_fn_with_state(
            (state, RouteGroup::Suggest),
            rate_limit,
        ))
}

/// Personalised ideas derived from the user's conversation topics and the
/// skill level stored in their profile.
#[utoipa::path(
    get,
    path = "/suggest/{user_id}",
    tag = "suggest",
    params(("user_id" = String, Path, description = "Conversation owner")),
    responses(
        (status = 200, description = "Suggestions", body = SuggestResponse),
        (status = 403, description = "Token belongs to another user"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
pub async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user_id): Path<String>,
) -> Result<Json<SuggestResponse>, ServerError> {
    check_user_id(&user_id)?;
    caller.ensure_owner(&user_id)?;

    let suggestions = match &state.conversations {
        None => default_suggestions(),
        Some(store) => {
            let history = store.read(&user_id).await?;
            let skill_level = match &state.users {
                Some(users) => users
                    .get_profile(&user_id)
                    .await?
                    .map(|profile| profile.skill_level)
                    .unwrap_or_default(),
                None => SkillLevel::default(),
            };
            topic_suggestions(&history, skill_level)
        }
    };
    Ok(Json(SuggestResponse {
        user_id,
        suggestions,
        generated_at: Utc::now(),
    }))
}
