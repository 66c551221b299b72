//! Conversation model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{ConversationInfo, MemberInfo, MemberRole};
use crate::message::{Message, normalize_timestamp};

/// Identifier of a local account on the messaging engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a conversation, unique within an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Create a new conversation ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Membership policy of a conversation, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationMode {
    /// Two-party conversation.
    OneToOne,
    /// Only admins may invite.
    AdminInvitesOnly,
    /// Any member may invite.
    InvitesOnly,
    /// Anyone may join.
    Public,
}

/// A conversation member as seen from a conversation.
///
/// This is a projection of membership data, not a full contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier (the URI).
    pub id: String,
    /// Engine URI of the participant.
    pub uri: String,
    /// Name to show.
    pub display_name: String,
    /// Always the local default; presence is never taken from membership data or disk.
    #[serde(skip)]
    pub is_online: bool,
}

impl Participant {
    /// Projects engine membership data into a participant.
    #[must_use]
    pub fn from_member(member: &MemberInfo) -> Self {
        let display_name = member
            .display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(member.uri.as_str())
            .to_string();

        Self {
            id: member.uri.clone(),
            uri: member.uri.clone(),
            display_name,
            is_online: false,
        }
    }
}

/// A conversation belonging to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Owning account.
    pub account_id: AccountId,
    /// Title to show.
    pub title: String,
    /// Current members, in engine order.
    pub participants: Vec<Participant>,
    /// Most recently appended message in the cache.
    pub last_message: Option<Message>,
    /// Messages not yet marked as read.
    pub unread_count: u32,
    /// Whether this is a group conversation.
    pub is_group: bool,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates a freshly made group conversation with no resolved participants.
    #[must_use]
    pub fn new_group(account_id: AccountId, id: ConversationId, title: impl Into<String>) -> Self {
        Self {
            id,
            account_id,
            title: title.into(),
            participants: Vec::new(),
            last_message: None,
            unread_count: 0,
            is_group: true,
            created_at: Utc::now(),
        }
    }

    /// Builds a conversation from the engine's info and member lists.
    ///
    /// Members that left or were banned are not participants. Without an
    /// explicit title, the names of the other participants are used.
    #[must_use]
    pub fn from_engine(
        account_id: AccountId,
        id: ConversationId,
        info: &ConversationInfo,
        members: &[MemberInfo],
        own_uri: Option<&str>,
        seconds_threshold: i64,
    ) -> Self {
        let participants: Vec<Participant> = members
            .iter()
            .filter(|m| !matches!(m.role, MemberRole::Left | MemberRole::Banned))
            .map(Participant::from_member)
            .collect();

        let title = info
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or_else(
                || fallback_title(&participants, own_uri, &id),
                ToString::to_string,
            );

        let is_group = derive_is_group(info.mode, participants.len());

        let created_at = info
            .created_at
            .and_then(|raw| normalize_timestamp(raw, seconds_threshold))
            .unwrap_or_else(Utc::now);

        Self {
            id,
            account_id,
            title,
            participants,
            last_message: None,
            unread_count: 0,
            is_group,
            created_at,
        }
    }

    /// URIs of all participants.
    pub fn participant_uris(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(|p| p.uri.as_str())
    }
}

/// Explicit mode wins; otherwise more than two participants makes a group.
#[must_use]
fn derive_is_group(mode: Option<ConversationMode>, participant_count: usize) -> bool {
    match mode {
        Some(mode) => mode != ConversationMode::OneToOne,
        None => participant_count > 2,
    }
}

fn fallback_title(participants: &[Participant], own_uri: Option<&str>, id: &ConversationId) -> String {
    let names: Vec<&str> = participants
        .iter()
        .filter(|p| Some(p.uri.as_str()) != own_uri)
        .map(|p| p.display_name.as_str())
        .collect();

    if names.is_empty() {
        id.to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SECONDS_THRESHOLD;

    fn member(uri: &str, name: Option<&str>, role: MemberRole) -> MemberInfo {
        MemberInfo {
            uri: uri.to_string(),
            display_name: name.map(ToString::to_string),
            role,
        }
    }

    #[test]
    fn test_is_group_from_count_when_mode_unknown() {
        assert!(!derive_is_group(None, 2));
        assert!(derive_is_group(None, 3));
    }

    #[test]
    fn test_explicit_mode_wins() {
        assert!(derive_is_group(Some(ConversationMode::InvitesOnly), 2));
        assert!(!derive_is_group(Some(ConversationMode::OneToOne), 5));
    }

    #[test]
    fn test_from_engine_skips_departed_members_and_titles_from_peers() {
        let members = vec![
            member("me", Some("Me"), MemberRole::Admin),
            member("bob", Some("Bob"), MemberRole::Member),
            member("eve", Some("Eve"), MemberRole::Left),
        ];
        let conv = Conversation::from_engine(
            AccountId::from("a1"),
            ConversationId::from("c1"),
            &ConversationInfo::default(),
            &members,
            Some("me"),
            DEFAULT_SECONDS_THRESHOLD,
        );

        assert_eq!(conv.participants.len(), 2);
        assert_eq!(conv.title, "Bob");
        assert!(!conv.is_group);
        assert!(conv.participants.iter().all(|p| !p.is_online));
    }

    #[test]
    fn test_from_engine_prefers_explicit_title() {
        let info = ConversationInfo {
            title: Some("Hiking".to_string()),
            mode: Some(ConversationMode::InvitesOnly),
            ..ConversationInfo::default()
        };
        let conv = Conversation::from_engine(
            AccountId::from("a1"),
            ConversationId::from("c1"),
            &info,
            &[],
            None,
            DEFAULT_SECONDS_THRESHOLD,
        );
        assert_eq!(conv.title, "Hiking");
        assert!(conv.is_group);
    }

    #[test]
    fn test_participant_name_falls_back_to_uri() {
        let p = Participant::from_member(&member("jami:abc", Some("  "), MemberRole::Member));
        assert_eq!(p.display_name, "jami:abc");
    }
}
