//! Conversation cache: account → ordered conversations.

use std::sync::Arc;

use super::live::{LiveList, SnapshotMap};
use crate::conversation::{AccountId, Conversation, ConversationId};

/// Live view of an account's conversations.
pub type LiveConversations = LiveList<AccountId, Conversation>;

/// In-memory conversations per account.
#[derive(Debug)]
pub struct ConversationCache {
    inner: SnapshotMap<AccountId, Conversation>,
}

impl Default for ConversationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SnapshotMap::new(),
        }
    }

    /// Conversations of the account, if the account is cached.
    #[must_use]
    pub fn get(&self, account_id: &AccountId) -> Option<Arc<Vec<Conversation>>> {
        self.inner.get(account_id)
    }

    /// One cached conversation.
    #[must_use]
    pub fn find(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Option<Conversation> {
        self.get(account_id)?
            .iter()
            .find(|c| &c.id == conversation_id)
            .cloned()
    }

    /// Whether the account has an entry (possibly empty).
    #[must_use]
    pub fn contains(&self, account_id: &AccountId) -> bool {
        self.inner.contains(account_id)
    }

    /// Replaces the account's conversations wholesale.
    pub fn replace(&self, account_id: &AccountId, conversations: Vec<Conversation>) -> Arc<Vec<Conversation>> {
        self.inner.replace(account_id, conversations)
    }

    /// Installs conversations only if the account has no entry yet.
    pub fn insert_if_absent(&self, account_id: &AccountId, conversations: Vec<Conversation>) -> bool {
        self.inner.insert_if_absent(account_id, conversations)
    }

    /// Appends a conversation unless one with the same id is already cached.
    ///
    /// Returns the account's list when it changed.
    pub fn append(&self, conversation: Conversation) -> Option<Arc<Vec<Conversation>>> {
        let account_id = conversation.account_id.clone();
        self.inner.update(&account_id, |current| {
            let current = current.unwrap_or_default();
            if current.iter().any(|c| c.id == conversation.id) {
                return None;
            }
            let mut next = current.to_vec();
            next.push(conversation);
            Some(next)
        })
    }

    /// Applies `f` to one conversation, replacing the account's list.
    ///
    /// Returns the list when the conversation was found.
    pub fn update<F>(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        f: F,
    ) -> Option<Arc<Vec<Conversation>>>
    where
        F: FnOnce(&mut Conversation),
    {
        self.inner.update(account_id, |current| {
            let current = current?;
            let index = current.iter().position(|c| &c.id == conversation_id)?;
            let mut next = current.to_vec();
            f(&mut next[index]);
            Some(next)
        })
    }

    /// Removes one conversation by id. Removing an unknown id is a no-op.
    ///
    /// Returns the list when it changed.
    pub fn remove_conversation(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Option<Arc<Vec<Conversation>>> {
        self.inner.update(account_id, |current| {
            let current = current?;
            if !current.iter().any(|c| &c.id == conversation_id) {
                return None;
            }
            Some(
                current
                    .iter()
                    .filter(|c| &c.id != conversation_id)
                    .cloned()
                    .collect(),
            )
        })
    }

    /// Drops the account's entry entirely.
    pub fn remove_account(&self, account_id: &AccountId) -> bool {
        self.inner.remove(account_id)
    }

    /// Live view of the account's conversations.
    #[must_use]
    pub fn watch(&self, account_id: AccountId) -> LiveConversations {
        self.inner.watch(account_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn conv(id: &str) -> Conversation {
        Conversation::new_group(AccountId::from("a1"), ConversationId::from(id), id)
    }

    #[test]
    fn test_append_ignores_known_id() {
        let cache = ConversationCache::new();
        assert!(cache.append(conv("c1")).is_some());
        assert!(cache.append(conv("c1")).is_none());
        assert_eq!(cache.get(&AccountId::from("a1")).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let cache = ConversationCache::new();
        let account = AccountId::from("a1");
        cache.replace(&account, vec![conv("c1"), conv("c2")]);

        assert!(cache.remove_conversation(&account, &ConversationId::from("c1")).is_some());
        assert!(cache.remove_conversation(&account, &ConversationId::from("c1")).is_none());
        assert!(cache.remove_conversation(&AccountId::from("zz"), &ConversationId::from("c2")).is_none());

        let list = cache.get(&account).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id.as_str(), "c2");
    }

    #[test]
    fn test_update_touches_only_target() {
        let cache = ConversationCache::new();
        let account = AccountId::from("a1");
        cache.replace(&account, vec![conv("c1"), conv("c2")]);

        cache.update(&account, &ConversationId::from("c2"), |c| c.unread_count = 4);

        let c1 = cache.find(&account, &ConversationId::from("c1")).unwrap();
        let c2 = cache.find(&account, &ConversationId::from("c2")).unwrap();
        assert_eq!(c1.unread_count, 0);
        assert_eq!(c2.unread_count, 4);
        assert!(cache.update(&account, &ConversationId::from("c9"), |_| {}).is_none());
    }
}
