//! Per-user conversation persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::ChatMessage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only message log keyed by user id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Stores one message after every message already stored for `user_id`.
    async fn append(&self, user_id: &str, message: &ChatMessage) -> Result<(), StoreError>;

    /// Full history in append order. Unknown users have an empty history.
    async fn read(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// The last `limit` messages, oldest first.
    async fn read_recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let mut messages = self.read(user_id).await?;
        let skip = messages.len().saturating_sub(limit);
        messages.drain(..skip);
        Ok(messages)
    }

    /// Appends `messages` in order, optionally tagged with a client session.
    /// Returns the number of stored messages.
    async fn append_batch(
        &self,
        user_id: &str,
        _session_id: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<usize, StoreError> {
        for message in messages {
            self.append(user_id, message).await?;
        }
        Ok(messages.len())
    }
}

/// In-process store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(&self, user_id: &str, message: &ChatMessage) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .entry(user_id.to_owned())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn read(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
