//! Turn pipeline of the codemate assistant: prompt assembly, local model
//! inference with a canned fallback, code analysis, rule-based suggestions
//! and conversation storage.

pub mod analyzer;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod rules;
pub mod store;
pub mod types;

pub use model::{ModelAdapter, ModelConfig, ModelError, TextGenerator};
pub use orchestrator::{TurnOptions, TurnOrchestrator};
pub use store::{ConversationStore, MemoryStore, StoreError};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, CodeBlock, Preferences, Role, SkillLevel,
    SuggestionSet,
};
