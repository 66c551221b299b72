//! Message cache: (account, conversation) → ordered messages.
//!
//! Lists are kept in append order and never hold two messages with the same
//! id.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::live::{LiveList, SnapshotMap};
use crate::conversation::{AccountId, ConversationId};
use crate::message::Message;

/// Composite key of the message cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageKey {
    /// Account.
    pub account_id: AccountId,
    /// Conversation within the account.
    pub conversation_id: ConversationId,
}

impl MessageKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(account_id: AccountId, conversation_id: ConversationId) -> Self {
        Self {
            account_id,
            conversation_id,
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.account_id, self.conversation_id)
    }
}

/// Live view of one conversation's messages.
pub type LiveMessages = LiveList<MessageKey, Message>;

/// In-memory messages per conversation.
#[derive(Debug)]
pub struct MessageCache {
    inner: SnapshotMap<MessageKey, Message>,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SnapshotMap::new(),
        }
    }

    /// Messages for the key, if cached.
    #[must_use]
    pub fn get(&self, key: &MessageKey) -> Option<Arc<Vec<Message>>> {
        self.inner.get(key)
    }

    /// Whether the key has an entry (possibly empty).
    #[must_use]
    pub fn contains(&self, key: &MessageKey) -> bool {
        self.inner.contains(key)
    }

    /// Most recently appended message for the key.
    #[must_use]
    pub fn last(&self, key: &MessageKey) -> Option<Message> {
        self.get(key)?.last().cloned()
    }

    /// Appends `message` unless an entry with the same id exists.
    ///
    /// Returns the new list when the message was appended.
    pub fn append(&self, key: &MessageKey, message: Message) -> Option<Arc<Vec<Message>>> {
        self.inner
            .update(key, |current| append_unique(current.unwrap_or_default(), message))
    }

    /// Replaces the key's messages with `batch`, keeping the first of any
    /// duplicated ids.
    pub fn replace(&self, key: &MessageKey, batch: Vec<Message>) -> Arc<Vec<Message>> {
        self.inner.replace(key, dedup_by_id(batch))
    }

    /// Puts an older page in front of the cached messages.
    ///
    /// Applies only while the cached list still starts with `anchor_id`.
    /// Messages already cached are skipped. Returns the new list when the
    /// page was applied.
    pub fn prepend(
        &self,
        key: &MessageKey,
        anchor_id: &str,
        older: Vec<Message>,
    ) -> Option<Arc<Vec<Message>>> {
        self.inner.update(key, |current| {
            let current = current?;
            if current.first().is_none_or(|m| m.id != anchor_id) {
                return None;
            }
            let mut next: Vec<Message> = dedup_by_id(older)
                .into_iter()
                .filter(|m| !current.iter().any(|c| c.id == m.id))
                .collect();
            next.extend_from_slice(current);
            Some(next)
        })
    }

    /// Installs messages only if the key has no entry yet.
    pub fn insert_if_absent(&self, key: &MessageKey, messages: Vec<Message>) -> bool {
        self.inner.insert_if_absent(key, dedup_by_id(messages))
    }

    /// Replaces the cached message sharing `message.id`, in place of order.
    ///
    /// Returns the new list when a message was replaced.
    pub fn update_message(&self, key: &MessageKey, message: Message) -> Option<Arc<Vec<Message>>> {
        self.inner.update(key, |current| {
            let current = current?;
            let index = current.iter().position(|m| m.id == message.id)?;
            if current[index] == message {
                return None;
            }
            let mut next = current.to_vec();
            next[index] = message;
            Some(next)
        })
    }

    /// Drops one key.
    pub fn remove(&self, key: &MessageKey) -> bool {
        self.inner.remove(key)
    }

    /// Drops every key of the account, returning the conversations dropped.
    pub fn remove_account(&self, account_id: &AccountId) -> Vec<ConversationId> {
        self.inner
            .remove_where(|key| &key.account_id == account_id)
            .into_iter()
            .map(|key| key.conversation_id)
            .collect()
    }

    /// Live view of the key's messages.
    #[must_use]
    pub fn watch(&self, key: MessageKey) -> LiveMessages {
        self.inner.watch(key)
    }
}

/// `current` plus `message`, or `None` when its id is already present.
fn append_unique(current: &[Message], message: Message) -> Option<Vec<Message>> {
    if current.iter().any(|m| m.id == message.id) {
        return None;
    }
    let mut next = Vec::with_capacity(current.len() + 1);
    next.extend_from_slice(current);
    next.push(message);
    Some(next)
}

/// Keeps the first occurrence of each id, preserving order.
fn dedup_by_id(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(messages.len());
    messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::message::{MessageStatus, MessageType};

    fn msg(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: ConversationId::from("c1"),
            author_id: "peer".to_string(),
            content: format!("body {id}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            status: MessageStatus::Delivered,
            message_type: MessageType::Text,
            reply_to: None,
        }
    }

    fn key() -> MessageKey {
        MessageKey::new(AccountId::from("a1"), ConversationId::from("c1"))
    }

    #[test]
    fn test_append_is_idempotent() {
        let cache = MessageCache::new();
        assert!(cache.append(&key(), msg("x", 1)).is_some());
        assert!(cache.append(&key(), msg("x", 1)).is_none());
        assert_eq!(cache.get(&key()).unwrap().len(), 1);
    }

    #[test]
    fn test_last_follows_append_order_not_timestamp() {
        let cache = MessageCache::new();
        cache.append(&key(), msg("a", 10));
        cache.append(&key(), msg("b", 30));
        cache.append(&key(), msg("c", 20));
        assert_eq!(cache.last(&key()).unwrap().id, "c");
    }

    #[test]
    fn test_replace_collapses_duplicates() {
        let cache = MessageCache::new();
        let list = cache.replace(&key(), vec![msg("a", 1), msg("b", 2), msg("a", 3)]);
        let ids: Vec<&str> = list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(list[0].timestamp.timestamp(), 1);
    }

    #[test]
    fn test_update_message_keeps_position() {
        let cache = MessageCache::new();
        cache.replace(&key(), vec![msg("a", 1), msg("b", 2)]);

        let mut edited = msg("a", 1);
        edited.content = "edited".to_string();
        assert!(cache.update_message(&key(), edited).is_some());
        assert!(cache.update_message(&key(), msg("zz", 1)).is_none());

        let list = cache.get(&key()).unwrap();
        assert_eq!(list[0].content, "edited");
        assert_eq!(list[1].id, "b");
    }

    #[test]
    fn test_remove_account_only_touches_its_keys() {
        let cache = MessageCache::new();
        let other = MessageKey::new(AccountId::from("a2"), ConversationId::from("c1"));
        cache.append(&key(), msg("a", 1));
        cache.append(&other, msg("a", 1));

        let removed = cache.remove_account(&AccountId::from("a1"));
        assert_eq!(removed, vec![ConversationId::from("c1")]);
        assert!(!cache.contains(&key()));
        assert!(cache.contains(&other));
    }

    #[test]
    fn test_prepend_requires_anchor_and_skips_known_ids() {
        let cache = MessageCache::new();
        cache.replace(&key(), vec![msg("c", 30), msg("d", 40)]);

        assert!(cache.prepend(&key(), "d", vec![msg("a", 10)]).is_none());

        let list = cache
            .prepend(&key(), "c", vec![msg("a", 10), msg("b", 20), msg("c", 30)])
            .unwrap();
        let ids: Vec<&str> = list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
        assert_eq!(cache.last(&key()).unwrap().id, "d");
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "a1:c1");
    }

    proptest! {
        #[test]
        fn appended_ids_are_unique_in_first_seen_order(ids in proptest::collection::vec(0u8..16, 0..64)) {
            let cache = MessageCache::new();
            for id in &ids {
                cache.append(&key(), msg(&id.to_string(), i64::from(*id)));
            }

            let mut expected: Vec<String> = Vec::new();
            for id in &ids {
                let id = id.to_string();
                if !expected.contains(&id) {
                    expected.push(id);
                }
            }

            let actual: Vec<String> = cache
                .get(&key())
                .map(|list| list.iter().map(|m| m.id.clone()).collect())
                .unwrap_or_default();
            prop_assert_eq!(actual, expected);
        }
    }
}
