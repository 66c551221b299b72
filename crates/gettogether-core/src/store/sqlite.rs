//! `SQLite` implementation of the persistence gateway.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::PersistenceGateway;
use crate::contacts::{ContactRecord, ContactRepository};
use crate::conversation::{AccountId, Conversation, ConversationId, ConversationRepository};
use crate::message::{Message, MessageRepository};
use crate::Result;

/// Persistence gateway backed by one `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conversations: ConversationRepository,
    messages: MessageRepository,
    contacts: ContactRepository,
}

impl SqliteStore {
    /// Open (or create) the store at the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        Ok(Self {
            conversations: ConversationRepository::from_pool(pool.clone()).await?,
            messages: MessageRepository::from_pool(pool.clone()).await?,
            contacts: ContactRepository::from_pool(pool).await?,
        })
    }
}

#[async_trait]
impl PersistenceGateway for SqliteStore {
    async fn save_conversations(&self, account_id: &AccountId, conversations: &[Conversation]) -> Result<()> {
        self.conversations.save_all(account_id, conversations).await
    }

    async fn load_conversations(&self, account_id: &AccountId) -> Result<Vec<Conversation>> {
        self.conversations.load(account_id).await
    }

    async fn clear_conversations(&self, account_id: &AccountId) -> Result<()> {
        self.conversations.clear(account_id).await
    }

    async fn save_messages(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<()> {
        self.messages.save_all(account_id, conversation_id, messages).await
    }

    async fn load_messages(&self, account_id: &AccountId, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        self.messages.load(account_id, conversation_id).await
    }

    async fn clear_messages(&self, account_id: &AccountId, conversation_id: &ConversationId) -> Result<()> {
        self.messages.clear(account_id, conversation_id).await
    }

    async fn message_conversation_ids(&self, account_id: &AccountId) -> Result<Vec<ConversationId>> {
        self.messages.conversation_ids(account_id).await
    }

    async fn save_contact(&self, contact: &ContactRecord) -> Result<()> {
        self.contacts.save(contact).await
    }

    async fn load_contacts(&self, account_id: &AccountId) -> Result<Vec<ContactRecord>> {
        self.contacts.list(account_id).await
    }

    async fn delete_contact(&self, account_id: &AccountId, uri: &str) -> Result<()> {
        self.contacts.delete(account_id, uri).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::conversation::Participant;
    use crate::message::{MessageStatus, MessageType};

    fn message(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: ConversationId::from("c1"),
            author_id: "jami:bob".to_string(),
            content: format!("text {id}"),
            timestamp: Utc.timestamp_millis_opt(secs * 1000 + 123).unwrap(),
            status: MessageStatus::Delivered,
            message_type: MessageType::Text,
            reply_to: None,
        }
    }

    fn conversation(id: &str) -> Conversation {
        let mut conv = Conversation::new_group(AccountId::from("a1"), ConversationId::from(id), format!("Group {id}"));
        conv.participants.push(Participant {
            id: "jami:bob".to_string(),
            uri: "jami:bob".to_string(),
            display_name: "Bob".to_string(),
            is_online: false,
        });
        conv.last_message = Some(message("m1", 100));
        conv.unread_count = 2;
        conv
    }

    #[tokio::test]
    async fn test_conversations_round_trip_in_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        let account = AccountId::from("a1");
        let saved = vec![conversation("c2"), conversation("c1")];

        store.save_conversations(&account, &saved).await.unwrap();
        let loaded = store.load_conversations(&account).await.unwrap();

        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_participant_presence_not_persisted() {
        let store = SqliteStore::in_memory().await.unwrap();
        let account = AccountId::from("a1");
        let mut conv = conversation("c1");
        conv.participants[0].is_online = true;

        store.save_conversations(&account, &[conv]).await.unwrap();
        let loaded = store.load_conversations(&account).await.unwrap();

        assert!(!loaded[0].participants[0].is_online);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_list() {
        let store = SqliteStore::in_memory().await.unwrap();
        let account = AccountId::from("a1");

        store
            .save_conversations(&account, &[conversation("c1"), conversation("c2")])
            .await
            .unwrap();
        store.save_conversations(&account, &[conversation("c3")]).await.unwrap();

        let loaded = store.load_conversations(&account).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id.as_str(), "c3");
    }

    #[tokio::test]
    async fn test_clear_does_not_resurrect() {
        let store = SqliteStore::in_memory().await.unwrap();
        let account = AccountId::from("a1");
        let conv_id = ConversationId::from("c1");

        store.save_conversations(&account, &[conversation("c1")]).await.unwrap();
        store.save_messages(&account, &conv_id, &[message("m1", 1)]).await.unwrap();

        store.clear_conversations(&account).await.unwrap();
        store.clear_messages(&account, &conv_id).await.unwrap();

        assert!(store.load_conversations(&account).await.unwrap().is_empty());
        assert!(store.load_messages(&account, &conv_id).await.unwrap().is_empty());
        assert!(store.message_conversation_ids(&account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_messages_round_trip_keeps_append_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        let account = AccountId::from("a1");
        let conv_id = ConversationId::from("c1");
        let mut reply = message("m0", 5);
        reply.reply_to = Some("m2".to_string());
        reply.status = MessageStatus::Sent;
        let saved = vec![message("m2", 50), message("m1", 10), reply];

        store.save_messages(&account, &conv_id, &saved).await.unwrap();
        let loaded = store.load_messages(&account, &conv_id).await.unwrap();

        assert_eq!(loaded, saved);
        assert_eq!(
            store.message_conversation_ids(&account).await.unwrap(),
            vec![conv_id]
        );
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .save_conversations(&AccountId::from("a1"), &[conversation("c1")])
            .await
            .unwrap();

        assert!(store
            .load_conversations(&AccountId::from("a2"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_banned_contact_reloads_unbanned() {
        let store = SqliteStore::in_memory().await.unwrap();
        let account = AccountId::from("a1");
        let mut contact = ContactRecord::new(account.clone(), "jami:bob", "Bob");
        contact.is_banned = true;

        store.save_contact(&contact).await.unwrap();
        let loaded = store.load_contacts(&account).await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].is_banned);
    }
}
