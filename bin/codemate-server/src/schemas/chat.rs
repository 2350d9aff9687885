use codemate_core::{ChatRequest, Preferences, SkillLevel};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Upper bound on one inbound message, in bytes after trimming.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024;

/// Request body for `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ChatBody {
    #[validate(custom(function = "message_bounds"))]
    pub message: String,
    #[serde(default)]
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

impl From<ChatBody> for ChatRequest {
    fn from(body: ChatBody) -> Self {
        ChatRequest {
            message: body.message,
            skill_level: body.skill_level,
            preferences: body.preferences,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ChatQuery {
    /// Conversation owner; anonymous turns are not stored.
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,
}

fn message_bounds(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("blank").with_message("message must not be blank".into()));
    }
    if trimmed.len() > MAX_MESSAGE_BYTES {
        return Err(ValidationError::new("too_long")
            .with_message(format!("message must be at most {MAX_MESSAGE_BYTES} bytes").into()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn body(message: String) -> ChatBody {
        ChatBody {
            message,
            skill_level: SkillLevel::default(),
            preferences: None,
        }
    }

    #[test]
    fn message_limit_counts_trimmed_bytes() {
        assert!(body("a".repeat(MAX_MESSAGE_BYTES)).validate().is_ok());
        assert!(body(format!("  {}\n", "a".repeat(MAX_MESSAGE_BYTES))).validate().is_ok());
        assert!(body("a".repeat(MAX_MESSAGE_BYTES + 1)).validate().is_err());
        // Two bytes per character.
        assert!(body("é".repeat(MAX_MESSAGE_BYTES / 2 + 1)).validate().is_err());
        assert!(body(" \t ".into()).validate().is_err());
    }
}
