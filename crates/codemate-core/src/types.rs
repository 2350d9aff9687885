//! Domain types shared by the turn pipeline, the stores and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when rendering history into a prompt.
    pub fn speaker(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Caller-supplied hint that only changes prompt phrasing and rule output.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// A fenced code segment lifted out of free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CodeBlock {
    /// Lowercase language tag, `plaintext` when nothing could be inferred.
    pub language: String,
    pub code: String,
}

/// One stored message of a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatMessage {
    pub role: Role,
    #[serde(rename = "content")]
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_blocks: Vec<CodeBlock>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            code_blocks: Vec::new(),
        }
    }

    pub fn with_code_blocks(mut self, code_blocks: Vec<CodeBlock>) -> Self {
        self.code_blocks = code_blocks;
        self
    }
}

/// Preferred languages and frameworks, folded into the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Preferences {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
}

/// Input of one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub skill_level: SkillLevel,
    pub preferences: Option<Preferences>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, skill_level: SkillLevel) -> Self {
        Self {
            message: message.into(),
            skill_level,
            preferences: None,
        }
    }
}

/// Output of one conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatResponse {
    pub response: String,
    pub suggestions: Vec<String>,
    pub code_blocks: Vec<CodeBlock>,
    pub follow_up_questions: Vec<String>,
    pub error_detected: bool,
    pub error_details: Vec<String>,
    /// `true` when the answer came from the canned fallback instead of the model.
    pub mock_response: bool,
}

/// Personalised suggestions grouped the way `/suggest` reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SuggestionSet {
    pub project_ideas: Vec<String>,
    pub learning_resources: Vec<String>,
    pub tools_and_libraries: Vec<String>,
    pub best_practices: Vec<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn skill_level_parses_lowercase_names() {
        assert_eq!(SkillLevel::from_str("beginner").unwrap(), SkillLevel::Beginner);
        assert_eq!(SkillLevel::from_str("advanced").unwrap(), SkillLevel::Advanced);
        assert!(SkillLevel::from_str("expert").is_err());
        assert_eq!(SkillLevel::default().to_string(), "intermediate");
    }

    #[test]
    fn message_without_code_omits_field() {
        let msg = ChatMessage::new(Role::User, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("code_blocks").is_none());
    }

    #[test]
    fn message_text_travels_as_content() {
        let json = serde_json::to_value(ChatMessage::new(Role::User, "hi")).unwrap();
        assert_eq!(json["content"], "hi");
        assert!(json.get("text").is_none());

        let parsed: ChatMessage = serde_json::from_str(
            r#"{"role":"assistant","content":"done","timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.role, Role::Assistant);
        assert_eq!(parsed.text, "done");
        assert!(parsed.code_blocks.is_empty());
    }
}
