//! Message storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::model::{Message, MessageStatus, MessageType};
use crate::conversation::{AccountId, ConversationId};
use crate::Result;

/// Repository for the persisted message list of each conversation.
///
/// A save replaces the conversation's whole list; `position` keeps append
/// order.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Creates the repository on an open pool, creating its table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                account_id TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                author_id TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL,
                message_type TEXT NOT NULL,
                reply_to TEXT,
                PRIMARY KEY (account_id, conversation_id, message_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_order
            ON messages(account_id, conversation_id, position)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace the conversation's stored messages with `messages`.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails; the previous list is kept
    /// in that case.
    pub async fn save_all(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE account_id = ? AND conversation_id = ?")
            .bind(account_id.as_str())
            .bind(conversation_id.as_str())
            .execute(&mut *tx)
            .await?;

        for (position, message) in (0_i64..).zip(messages) {
            sqlx::query(
                r"
                INSERT INTO messages
                    (account_id, conversation_id, message_id, position, author_id, content,
                     timestamp, status, message_type, reply_to)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(account_id, conversation_id, message_id) DO NOTHING
                ",
            )
            .bind(account_id.as_str())
            .bind(conversation_id.as_str())
            .bind(&message.id)
            .bind(position)
            .bind(&message.author_id)
            .bind(&message.content)
            .bind(message.timestamp.to_rfc3339())
            .bind(message.status.as_str())
            .bind(message.message_type.as_tag())
            .bind(&message.reply_to)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%account_id, %conversation_id, count = messages.len(), "Saved messages");
        Ok(())
    }

    /// Stored messages of the conversation, in saved order.
    ///
    /// Rows with an unreadable timestamp or status are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT conversation_id, message_id, author_id, content, timestamp, status,
                   message_type, reply_to
            FROM messages
            WHERE account_id = ? AND conversation_id = ?
            ORDER BY position
            ",
        )
        .bind(account_id.as_str())
        .bind(conversation_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .filter_map(|row| {
                let timestamp_str: String = row.get("timestamp");
                let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                    .ok()?
                    .with_timezone(&Utc);
                let status_str: String = row.get("status");
                let status = MessageStatus::from_tag(&status_str)?;
                let type_str: String = row.get("message_type");

                Some(Message {
                    id: row.get("message_id"),
                    conversation_id: ConversationId(row.get("conversation_id")),
                    author_id: row.get("author_id"),
                    content: row.get("content"),
                    timestamp,
                    status,
                    message_type: MessageType::from_tag(&type_str),
                    reply_to: row.get("reply_to"),
                })
            })
            .collect();

        Ok(messages)
    }

    /// Delete the conversation's stored messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self, account_id: &AccountId, conversation_id: &ConversationId) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE account_id = ? AND conversation_id = ?")
            .bind(account_id.as_str())
            .bind(conversation_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Conversations of the account that have stored messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn conversation_ids(&self, account_id: &AccountId) -> Result<Vec<ConversationId>> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT conversation_id
            FROM messages
            WHERE account_id = ?
            ORDER BY conversation_id
            ",
        )
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ConversationId(row.get("conversation_id")))
            .collect())
    }
}
