//! Interface to the external messaging engine.
//!
//! The engine owns transport, cryptography and its own storage. This crate
//! only issues commands through [`MessagingEngine`] and consumes the events it
//! publishes (see [`crate::event`]).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{AccountId, ConversationId, ConversationMode};

/// Errors reported by the messaging engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine is not running or not reachable.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The account, conversation or contact does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The engine refused the command.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Result type for engine commands.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Conversation metadata reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    /// Title set by members, if any.
    pub title: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Membership mode, when the engine reports one.
    pub mode: Option<ConversationMode>,
    /// Raw creation timestamp (seconds or milliseconds).
    pub created_at: Option<i64>,
}

/// Role of a member inside a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Conversation administrator.
    Admin,
    /// Regular member.
    #[default]
    Member,
    /// Invited, not yet joined.
    Invited,
    /// Banned from the conversation.
    Banned,
    /// Left the conversation.
    Left,
}

/// One entry of a conversation's membership list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Member URI.
    pub uri: String,
    /// Profile name, when known.
    pub display_name: Option<String>,
    /// Member role.
    pub role: MemberRole,
}

/// Commands the synchronization core issues to the messaging engine.
///
/// Implementations wrap the platform bridge. All calls are asynchronous and
/// may fail independently; the engine serializes its own internal state.
#[async_trait]
pub trait MessagingEngine: Send + Sync {
    /// URI identifying the account itself.
    async fn account_uri(&self, account_id: &AccountId) -> EngineResult<String>;

    /// Ids of all conversations of the account.
    async fn list_conversation_ids(&self, account_id: &AccountId)
    -> EngineResult<Vec<ConversationId>>;

    /// Metadata of one conversation.
    async fn conversation_info(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> EngineResult<ConversationInfo>;

    /// Membership list of one conversation.
    async fn conversation_members(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> EngineResult<Vec<MemberInfo>>;

    /// Creates an empty conversation and returns its id.
    async fn create_conversation(&self, account_id: &AccountId) -> EngineResult<ConversationId>;

    /// Updates conversation metadata fields (e.g. `title`).
    async fn update_conversation_info(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        fields: &HashMap<String, String>,
    ) -> EngineResult<()>;

    /// Invites a member.
    async fn add_member(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        uri: &str,
    ) -> EngineResult<()>;

    /// Removes a member.
    async fn remove_member(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        uri: &str,
    ) -> EngineResult<()>;

    /// Deletes (leaves) a conversation.
    async fn delete_conversation(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> EngineResult<()>;

    /// Accepts a pending conversation request.
    async fn accept_conversation_request(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> EngineResult<()>;

    /// Declines a pending conversation request.
    async fn decline_conversation_request(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> EngineResult<()>;

    /// Sends a text message and returns the engine-assigned id.
    async fn send_message(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        content: &str,
        reply_to: Option<&str>,
    ) -> EngineResult<String>;

    /// Requests up to `count` messages preceding `from_id` (newest when empty).
    ///
    /// Returns the request id echoed by the matching `MessagesLoaded` event.
    async fn load_messages(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        from_id: &str,
        count: u32,
    ) -> EngineResult<u32>;

    /// Marks a message (and everything before it) as displayed.
    async fn mark_displayed(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        message_id: &str,
    ) -> EngineResult<()>;

    /// Publishes the local typing indicator.
    async fn set_composing(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        is_composing: bool,
    ) -> EngineResult<()>;

    /// Removes a contact, optionally banning it.
    async fn remove_contact(&self, account_id: &AccountId, uri: &str, ban: bool)
    -> EngineResult<()>;
}
