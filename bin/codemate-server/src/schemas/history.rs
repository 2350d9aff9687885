use codemate_core::ChatMessage;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Most recent messages to return (default 50).
    #[validate(range(min = 1, max = MAX_HISTORY_LIMIT))]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub user_id: String,
    pub history: Vec<ChatMessage>,
    pub database_connected: bool,
}

/// Request body for `POST /save/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SaveBody {
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveResponse {
    pub saved: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
