use std::str::FromStr;

use async_trait::async_trait;
use codemate_core::{ChatMessage, CodeBlock, ConversationStore, Role, StoreError};

use super::{SqliteStore, parse_timestamp, store_error};

type MessageRow = (String, String, String, String);

fn from_row((role, content, code_blocks, created_at): MessageRow) -> Result<ChatMessage, StoreError> {
    let role = Role::from_str(&role)
        .map_err(|_| StoreError::Backend(format!("unknown message role {role:?}")))?;
    let code_blocks: Vec<CodeBlock> = serde_json::from_str(&code_blocks)?;
    Ok(ChatMessage {
        role,
        text: content,
        timestamp: parse_timestamp(&created_at),
        code_blocks,
    })
}

const INSERT_MESSAGE: &str = "INSERT INTO conversation_messages \
     (user_id, session_id, role, content, code_blocks, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn append(&self, user_id: &str, message: &ChatMessage) -> Result<(), StoreError> {
        let code_blocks = serde_json::to_string(&message.code_blocks)?;
        sqlx::query(INSERT_MESSAGE)
            .bind(user_id)
            .bind(None::<String>)
            .bind(message.role.as_ref())
            .bind(&message.text)
            .bind(&code_blocks)
            .bind(message.timestamp.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn read(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT role, content, code_blocks, created_at \
             FROM conversation_messages WHERE user_id = ?1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(from_row).collect()
    }

    async fn read_recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT role, content, code_blocks, created_at \
             FROM conversation_messages WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().rev().map(from_row).collect()
    }

    async fn append_batch(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        for message in messages {
            let code_blocks = serde_json::to_string(&message.code_blocks)?;
            sqlx::query(INSERT_MESSAGE)
                .bind(user_id)
                .bind(session_id)
                .bind(message.role.as_ref())
                .bind(&message.text)
                .bind(&code_blocks)
                .bind(message.timestamp.to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(messages.len())
    }
}
