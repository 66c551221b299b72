//! Durable mirror of the caches.
//!
//! [`PersistenceGateway`] is what the synchronization controller writes
//! through. A load returns exactly what the last save wrote for that key,
//! minus fields the records deliberately omit (participant presence, contact
//! ban and presence), and never brings back a cleared key.

mod sqlite;

use async_trait::async_trait;

pub use sqlite::SqliteStore;

use crate::contacts::ContactRecord;
use crate::conversation::{AccountId, Conversation, ConversationId};
use crate::message::Message;
use crate::Result;

/// Durable key-value storage for conversations, messages and contacts.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Replace the stored conversation list of the account.
    async fn save_conversations(&self, account_id: &AccountId, conversations: &[Conversation]) -> Result<()>;

    /// Stored conversations of the account, empty if none.
    async fn load_conversations(&self, account_id: &AccountId) -> Result<Vec<Conversation>>;

    /// Forget the account's conversations.
    async fn clear_conversations(&self, account_id: &AccountId) -> Result<()>;

    /// Replace the stored messages of one conversation.
    async fn save_messages(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<()>;

    /// Stored messages of one conversation, empty if none.
    async fn load_messages(&self, account_id: &AccountId, conversation_id: &ConversationId) -> Result<Vec<Message>>;

    /// Forget one conversation's messages.
    async fn clear_messages(&self, account_id: &AccountId, conversation_id: &ConversationId) -> Result<()>;

    /// Conversations of the account that have stored messages.
    async fn message_conversation_ids(&self, account_id: &AccountId) -> Result<Vec<ConversationId>>;

    /// Insert or update a contact record.
    async fn save_contact(&self, contact: &ContactRecord) -> Result<()>;

    /// Stored contacts of the account.
    async fn load_contacts(&self, account_id: &AccountId) -> Result<Vec<ContactRecord>>;

    /// Forget one contact.
    async fn delete_contact(&self, account_id: &AccountId, uri: &str) -> Result<()>;
}
