//! Conversation storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::model::{AccountId, Conversation, ConversationId};
use crate::Result;

/// Repository for the persisted conversation list of each account.
///
/// A save replaces the account's whole list; `position` keeps its order.
#[derive(Debug, Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
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
            CREATE TABLE IF NOT EXISTS conversations (
                account_id TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                participants_json TEXT NOT NULL DEFAULT '[]',
                last_message_json TEXT,
                unread_count INTEGER NOT NULL DEFAULT 0,
                is_group INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (account_id, conversation_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_conversations_order
            ON conversations(account_id, position)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace the account's stored conversations with `conversations`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or a database query fails; the
    /// previous list is kept in that case.
    pub async fn save_all(&self, account_id: &AccountId, conversations: &[Conversation]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM conversations WHERE account_id = ?")
            .bind(account_id.as_str())
            .execute(&mut *tx)
            .await?;

        for (position, conversation) in (0_i64..).zip(conversations) {
            let participants_json = serde_json::to_string(&conversation.participants)?;
            let last_message_json = conversation
                .last_message
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r"
                INSERT INTO conversations
                    (account_id, conversation_id, position, title, participants_json,
                     last_message_json, unread_count, is_group, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(account_id, conversation_id) DO NOTHING
                ",
            )
            .bind(account_id.as_str())
            .bind(conversation.id.as_str())
            .bind(position)
            .bind(&conversation.title)
            .bind(participants_json)
            .bind(last_message_json)
            .bind(conversation.unread_count)
            .bind(conversation.is_group)
            .bind(conversation.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%account_id, count = conversations.len(), "Saved conversations");
        Ok(())
    }

    /// Stored conversations of the account, in saved order.
    ///
    /// Rows that fail to decode are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load(&self, account_id: &AccountId) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            r"
            SELECT account_id, conversation_id, title, participants_json, last_message_json,
                   unread_count, is_group, created_at
            FROM conversations
            WHERE account_id = ?
            ORDER BY position
            ",
        )
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let conversations = rows
            .iter()
            .filter_map(|row| {
                let created_at_str: String = row.get("created_at");
                let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                    .ok()?
                    .with_timezone(&Utc);

                let participants_json: String = row.get("participants_json");
                let participants = serde_json::from_str(&participants_json).ok()?;

                let last_message_json: Option<String> = row.get("last_message_json");
                let last_message = match last_message_json {
                    Some(json) => Some(serde_json::from_str(&json).ok()?),
                    None => None,
                };

                Some(Conversation {
                    id: ConversationId(row.get("conversation_id")),
                    account_id: AccountId(row.get("account_id")),
                    title: row.get("title"),
                    participants,
                    last_message,
                    unread_count: row.get::<u32, _>("unread_count"),
                    is_group: row.get::<bool, _>("is_group"),
                    created_at,
                })
            })
            .collect();

        Ok(conversations)
    }

    /// Delete every stored conversation of the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self, account_id: &AccountId) -> Result<()> {
        sqlx::query("DELETE FROM conversations WHERE account_id = ?")
            .bind(account_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
