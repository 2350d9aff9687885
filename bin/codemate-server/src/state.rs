//! Shared application state injected into every Axum handler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use codemate_core::{CodeBlock, ConversationStore, TextGenerator, TurnOrchestrator};

use crate::config::Config;
use crate::entities::{SqliteStore, UserStore};
use crate::middleware::rate_limit::RateLimiter;
use crate::security::TokenIssuer;

const RECENT_CODE_CAPACITY: usize = 1024;

/// Last generated code block per caller, served by `/download/code`.
pub struct RecentCode {
    blocks: Mutex<HashMap<String, CodeBlock>>,
}

impl std::fmt::Debug for RecentCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blocks.lock().map(|b| b.len()).unwrap_or(0);
        write!(f, "RecentCode({count} callers)")
    }
}

impl Default for RecentCode {
    fn default() -> Self {
        Self::new()
    }
}

impl RecentCode {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, caller: impl Into<String>, block: CodeBlock) {
        if let Ok(mut map) = self.blocks.lock() {
            // Crude bound; entries are cheap to regenerate from history.
            if map.len() >= RECENT_CODE_CAPACITY {
                map.clear();
            }
            map.insert(caller.into(), block);
        }
    }

    pub fn get(&self, caller: &str) -> Option<CodeBlock> {
        self.blocks.lock().ok()?.get(caller).cloned()
    }
}

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub orchestrator: Arc<TurnOrchestrator>,
    /// `None` when the database could not be opened at startup.
    pub conversations: Option<Arc<dyn ConversationStore>>,
    pub users: Option<Arc<dyn UserStore>>,
    pub tokens: Arc<TokenIssuer>,
    pub rate_limiter: Arc<RateLimiter>,
    pub recent_code: Arc<RecentCode>,
}

impl AppState {
    /// Wires the turn pipeline, stores and security helpers from `config`.
    pub fn new(
        config: Config,
        generator: Arc<dyn TextGenerator>,
        store: Option<Arc<SqliteStore>>,
    ) -> Arc<Self> {
        let conversations = store
            .clone()
            .map(|s| s as Arc<dyn ConversationStore>);
        let users = store.map(|s| s as Arc<dyn UserStore>);
        let orchestrator =
            TurnOrchestrator::new(generator, conversations.clone(), config.turn.clone());
        Arc::new(Self {
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl)),
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            conversations,
            users,
            rate_limiter: Arc::new(RateLimiter::default()),
            recent_code: Arc::new(RecentCode::new()),
        })
    }

    pub fn database_connected(&self) -> bool {
        self.conversations.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recent_code_keeps_latest_block_per_caller() {
        let recent = RecentCode::new();
        let block = |code: &str| CodeBlock {
            language: "python".into(),
            code: code.into(),
        };
        recent.insert("u1", block("a = 1"));
        recent.insert("u1", block("a = 2"));
        recent.insert("u2", block("b = 1"));
        assert_eq!(recent.get("u1").unwrap().code, "a = 2");
        assert_eq!(recent.get("u2").unwrap().code, "b = 1");
        assert!(recent.get("u3").is_none());
    }
}
