//! Event types emitted by the messaging engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::conversation::{AccountId, ConversationId};

/// A message as carried by engine events, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineMessage {
    /// Engine-assigned message id.
    pub id: String,
    /// MIME-like type tag (`text/plain`, `member`, ...).
    pub message_type: String,
    /// Author URI.
    pub author: String,
    /// Body text, absent for some payload kinds.
    pub body: Option<String>,
    /// Raw timestamp; upstream mixes seconds and milliseconds.
    pub timestamp: i64,
    /// Id of the message replied to.
    pub reply_to: Option<String>,
}

/// What happened to a conversation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberEventKind {
    /// Member was invited.
    Invited,
    /// Member joined.
    Joined,
    /// Member left.
    Left,
    /// Member was banned.
    Banned,
    /// Member was unbanned.
    Unbanned,
}

/// Conversation and message lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationEvent {
    /// A new message arrived (remote, or the echo of a local send).
    MessageReceived {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// Message payload.
        message: EngineMessage,
    },
    /// An existing message changed (edit, status).
    MessageUpdated {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// New payload for the message with the same id.
        message: EngineMessage,
    },
    /// A page of history answered a `load_messages` request.
    MessagesLoaded {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// Request id returned by `load_messages`.
        request_id: u32,
        /// Messages, in engine order.
        messages: Vec<EngineMessage>,
    },
    /// A conversation became usable (created, joined, or synced).
    ConversationReady {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
    },
    /// A conversation was removed.
    ConversationRemoved {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
    },
    /// Someone invited the account to a conversation.
    ConversationRequestReceived {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// Request metadata (`from`, `title`, ...).
        metadata: HashMap<String, String>,
    },
    /// Membership changed.
    ConversationMemberEvent {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// Member concerned.
        member_uri: String,
        /// What happened.
        event_type: MemberEventKind,
    },
    /// A peer started or stopped typing.
    ComposingStatusChanged {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// Typing peer.
        from: String,
        /// Whether they are typing.
        is_composing: bool,
    },
    /// Conversation profile (title, avatar, ...) changed.
    ConversationProfileUpdated {
        /// Account.
        account_id: AccountId,
        /// Conversation.
        conversation_id: ConversationId,
        /// Updated profile fields.
        profile: HashMap<String, String>,
    },
}

impl ConversationEvent {
    /// Account the event belongs to.
    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        match self {
            Self::MessageReceived { account_id, .. }
            | Self::MessageUpdated { account_id, .. }
            | Self::MessagesLoaded { account_id, .. }
            | Self::ConversationReady { account_id, .. }
            | Self::ConversationRemoved { account_id, .. }
            | Self::ConversationRequestReceived { account_id, .. }
            | Self::ConversationMemberEvent { account_id, .. }
            | Self::ComposingStatusChanged { account_id, .. }
            | Self::ConversationProfileUpdated { account_id, .. } => account_id,
        }
    }

    /// Conversation the event belongs to.
    #[must_use]
    pub const fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::MessageReceived {
                conversation_id, ..
            }
            | Self::MessageUpdated {
                conversation_id, ..
            }
            | Self::MessagesLoaded {
                conversation_id, ..
            }
            | Self::ConversationReady {
                conversation_id, ..
            }
            | Self::ConversationRemoved {
                conversation_id, ..
            }
            | Self::ConversationRequestReceived {
                conversation_id, ..
            }
            | Self::ConversationMemberEvent {
                conversation_id, ..
            }
            | Self::ComposingStatusChanged {
                conversation_id, ..
            }
            | Self::ConversationProfileUpdated {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// Account lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    /// Registration state changed (`REGISTERED`, `UNREGISTERED`, ...).
    RegistrationStateChanged {
        /// Account.
        account_id: AccountId,
        /// New state name.
        state: String,
    },
    /// Accounts were added or removed.
    AccountsChanged,
}

/// Contact events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactEvent {
    /// A contact was added.
    ContactAdded {
        /// Account.
        account_id: AccountId,
        /// Contact URI.
        uri: String,
        /// Whether the contact confirmed.
        confirmed: bool,
    },
    /// A contact was removed.
    ContactRemoved {
        /// Account.
        account_id: AccountId,
        /// Contact URI.
        uri: String,
        /// Whether the contact was banned.
        banned: bool,
    },
    /// Presence changed.
    PresenceChanged {
        /// Account.
        account_id: AccountId,
        /// Contact URI.
        uri: String,
        /// Online state.
        is_online: bool,
    },
    /// A trust request arrived.
    TrustRequestReceived {
        /// Account.
        account_id: AccountId,
        /// Requesting URI.
        from: String,
        /// Conversation attached to the request, if any.
        conversation_id: Option<ConversationId>,
    },
}

/// Call events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallEvent {
    /// An incoming call.
    IncomingCall {
        /// Account.
        account_id: AccountId,
        /// Engine call id.
        call_id: String,
        /// Caller URI.
        peer_uri: String,
        /// Whether video is offered.
        has_video: bool,
    },
    /// A call changed state (`RINGING`, `CURRENT`, `OVER`, ...).
    CallStateChanged {
        /// Account.
        account_id: AccountId,
        /// Engine call id.
        call_id: String,
        /// New state name.
        state: String,
    },
}

/// Any event published by the messaging engine, tagged by domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Account domain.
    Account(AccountEvent),
    /// Contact domain.
    Contact(ContactEvent),
    /// Conversation domain.
    Conversation(ConversationEvent),
    /// Call domain.
    Call(CallEvent),
}

impl From<AccountEvent> for EngineEvent {
    fn from(event: AccountEvent) -> Self {
        Self::Account(event)
    }
}

impl From<ContactEvent> for EngineEvent {
    fn from(event: ContactEvent) -> Self {
        Self::Contact(event)
    }
}

impl From<ConversationEvent> for EngineEvent {
    fn from(event: ConversationEvent) -> Self {
        Self::Conversation(event)
    }
}

impl From<CallEvent> for EngineEvent {
    fn from(event: CallEvent) -> Self {
        Self::Call(event)
    }
}
