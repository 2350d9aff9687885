use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("username pattern is valid"));

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 3, max = 64), regex(path = *USERNAME))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginBody {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
    pub user_id: String,
}
