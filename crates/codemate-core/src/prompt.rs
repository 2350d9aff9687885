//! Deterministic prompt assembly for one turn.

use crate::types::{ChatMessage, ChatRequest, SkillLevel};

const DEFAULT_LANGUAGES: &str = "Python, JavaScript";

fn skill_phrasing(skill_level: SkillLevel) -> &'static str {
    match skill_level {
        SkillLevel::Beginner => {
            "Explain concepts step by step in plain language, avoid jargon and comment every code example."
        }
        SkillLevel::Intermediate => {
            "Balance explanation with working code and point out relevant best practices."
        }
        SkillLevel::Advanced => {
            "Be concise and focus on trade-offs, performance and architecture."
        }
    }
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_owned()
    } else {
        items.join(", ")
    }
}

/// Builds the full prompt: system template, skill phrasing, preferences,
/// the trailing `history` and the current message, ending with the
/// assistant cue.
pub fn build(request: &ChatRequest, history: &[ChatMessage]) -> String {
    let preferences = request.preferences.clone().unwrap_or_default();
    let mut prompt = format!(
        "You are an expert coding assistant. The user is a {skill} developer.\n\
         {phrasing}\n\
         Preferred languages: {languages}\n\
         Preferred frameworks: {frameworks}\n\
         Provide helpful, accurate code examples and explanations.\n\
         Ask clarifying questions when needed.\n\
         Check code for errors and suggest improvements.\n\n",
        skill = request.skill_level,
        phrasing = skill_phrasing(request.skill_level),
        languages = join_or(&preferences.languages, DEFAULT_LANGUAGES),
        frameworks = join_or(&preferences.frameworks, "none"),
    );
    for message in history {
        prompt.push_str(message.role.speaker());
        prompt.push_str(": ");
        prompt.push_str(message.text.trim());
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(request.message.trim());
    prompt.push_str("\nAssistant:");
    prompt
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{Preferences, Role};

    #[test]
    fn prompt_contains_skill_history_and_cue() {
        let request = ChatRequest::new("How do I sort a list?", SkillLevel::Beginner);
        let history = vec![
            ChatMessage::new(Role::User, "hi"),
            ChatMessage::new(Role::Assistant, "Hello!"),
        ];
        let prompt = build(&request, &history);
        assert!(prompt.contains("The user is a beginner developer."));
        assert!(prompt.contains("Preferred languages: Python, JavaScript"));
        assert!(prompt.contains("User: hi\nAssistant: Hello!\nUser: How do I sort a list?"));
        assert!(prompt.ends_with("\nAssistant:"));
    }

    #[test]
    fn prompt_is_deterministic_and_uses_preferences() {
        let mut request = ChatRequest::new("x", SkillLevel::Advanced);
        request.preferences = Some(Preferences {
            languages: vec!["Rust".into()],
            frameworks: vec!["axum".into(), "tokio".into()],
        });
        let a = build(&request, &[]);
        assert_eq!(a, build(&request, &[]));
        assert!(a.contains("Preferred languages: Rust\n"));
        assert!(a.contains("Preferred frameworks: axum, tokio\n"));
        assert!(a.contains("trade-offs"));
    }
}
