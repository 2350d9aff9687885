/// Canned answers keyed by the first fragment found in the message.
const RESPONSES: &[(&str, &str)] = &[
    (
        "hello",
        "Hello! I'm your coding assistant. How can I help you today?",
    ),
    (
        "python",
        "Python is a great language! What would you like to build?",
    ),
    (
        "javascript",
        "JavaScript is perfect for web development. Are you working on frontend or backend?",
    ),
    (
        "help",
        "I can help you with Python, JavaScript, React, and more. What's your project about?",
    ),
];

const GENERIC: &str =
    "I'm here to help with your coding questions. What would you like to build today?";

/// Deterministic fallback answer used when the model cannot respond.
pub fn respond(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    RESPONSES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or(GENERIC, |(_, answer)| answer)
}
