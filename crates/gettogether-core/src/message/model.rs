//! Message data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;
use crate::event::EngineMessage;

/// Delivery state of a message.
///
/// `Pending → Sent → Delivered → Read`, with `Failed` reachable from
/// `Pending` and `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Queued locally, not yet handed to the engine.
    Pending,
    /// Accepted by the engine.
    #[default]
    Sent,
    /// Delivered to (or received from) the peer.
    Delivered,
    /// Displayed by the recipient.
    Read,
    /// Transport failed.
    Failed,
}

impl MessageStatus {
    /// Returns the storage tag for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    /// Parses a storage tag. Unknown tags map to `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Kind of message payload, from the engine's type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Plain text (`text/plain`).
    #[default]
    Text,
    /// File transfer (`application/data-transfer+json`).
    File,
    /// Call history entry (`application/call-history+json`).
    Call,
    /// Membership change (`member`).
    Member,
    /// Any other tag, kept verbatim.
    Other(String),
}

impl MessageType {
    /// Maps an engine type tag to a message type.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" | "text/plain" => Self::Text,
            "application/data-transfer+json" => Self::File,
            "application/call-history+json" => Self::Call,
            "member" => Self::Member,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the engine type tag.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Text => "text/plain",
            Self::File => "application/data-transfer+json",
            Self::Call => "application/call-history+json",
            Self::Member => "member",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<MessageType> for String {
    fn from(message_type: MessageType) -> Self {
        message_type.as_tag().to_string()
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique within its conversation.
    pub id: String,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// URI (or account id for local messages) of the author.
    pub author_id: String,
    /// Body text.
    pub content: String,
    /// When the message was authored, millisecond precision.
    pub timestamp: DateTime<Utc>,
    /// Delivery state.
    pub status: MessageStatus,
    /// Payload kind.
    pub message_type: MessageType,
    /// Id of the message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Message {
    /// Creates a locally authored text message in `Sent` state with a fresh id.
    #[must_use]
    pub fn outgoing(
        conversation_id: ConversationId,
        author_id: impl Into<String>,
        content: impl Into<String>,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            author_id: author_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
            message_type: MessageType::Text,
            reply_to,
        }
    }

    /// Builds a `Delivered` message from an engine payload.
    ///
    /// Returns `None` when the payload has no id or no body text.
    #[must_use]
    pub fn from_engine(
        conversation_id: &ConversationId,
        raw: &EngineMessage,
        seconds_threshold: i64,
    ) -> Option<Self> {
        if raw.id.is_empty() {
            return None;
        }
        let content = raw.body.as_deref().filter(|body| !body.is_empty())?;

        Some(Self {
            id: raw.id.clone(),
            conversation_id: conversation_id.clone(),
            author_id: raw.author.clone(),
            content: content.to_string(),
            timestamp: normalize_timestamp(raw.timestamp, seconds_threshold)
                .unwrap_or_else(Utc::now),
            status: MessageStatus::Delivered,
            message_type: MessageType::from_tag(&raw.message_type),
            reply_to: raw.reply_to.clone(),
        })
    }
}

/// Converts a raw engine timestamp to a UTC instant.
///
/// Upstream sends both seconds and milliseconds; values below `threshold` are
/// taken as seconds. Returns `None` if the value is out of range.
#[must_use]
pub fn normalize_timestamp(raw: i64, threshold: i64) -> Option<DateTime<Utc>> {
    let millis = if raw < threshold {
        raw.checked_mul(1000)?
    } else {
        raw
    };
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SECONDS_THRESHOLD;

    fn raw(id: &str, body: Option<&str>, timestamp: i64) -> EngineMessage {
        EngineMessage {
            id: id.to_string(),
            message_type: "text/plain".to_string(),
            author: "jami:peer".to_string(),
            body: body.map(ToString::to_string),
            timestamp,
            reply_to: None,
        }
    }

    #[test]
    fn test_seconds_are_converted() {
        let ts = normalize_timestamp(1_700_000_000, DEFAULT_SECONDS_THRESHOLD).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_millis_are_kept() {
        let ts = normalize_timestamp(1_700_000_000_123, DEFAULT_SECONDS_THRESHOLD).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_overflowing_seconds_rejected() {
        assert!(normalize_timestamp(i64::MIN, DEFAULT_SECONDS_THRESHOLD).is_none());
    }

    #[test]
    fn test_from_engine_builds_delivered_message() {
        let conv = ConversationId::from("c1");
        let msg =
            Message::from_engine(&conv, &raw("m1", Some("hi"), 1_700_000_000), DEFAULT_SECONDS_THRESHOLD)
                .unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_from_engine_drops_missing_body() {
        let conv = ConversationId::from("c1");
        assert!(Message::from_engine(&conv, &raw("m1", None, 0), DEFAULT_SECONDS_THRESHOLD).is_none());
        assert!(
            Message::from_engine(&conv, &raw("m1", Some(""), 0), DEFAULT_SECONDS_THRESHOLD).is_none()
        );
        assert!(
            Message::from_engine(&conv, &raw("", Some("x"), 0), DEFAULT_SECONDS_THRESHOLD).is_none()
        );
    }

    #[test]
    fn test_outgoing_is_sent_with_unique_id() {
        let conv = ConversationId::from("c1");
        let a = Message::outgoing(conv.clone(), "a1", "hello", None);
        let b = Message::outgoing(conv, "a1", "hello", None);
        assert_eq!(a.status, MessageStatus::Sent);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(MessageType::from_tag("member"), MessageType::Member);
        assert_eq!(
            MessageType::from_tag("application/x-custom"),
            MessageType::Other("application/x-custom".to_string())
        );
        assert_eq!(MessageType::File.as_tag(), "application/data-transfer+json");
    }
}
