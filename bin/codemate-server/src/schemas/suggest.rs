use chrono::{DateTime, Utc};
use codemate_core::SuggestionSet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuggestResponse {
    pub user_id: String,
    pub suggestions: SuggestionSet,
    pub generated_at: DateTime<Utc>,
}
