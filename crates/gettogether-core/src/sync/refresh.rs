//! Pull-based reconciliation of an account's conversation list.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::SyncController;
use crate::cache::MessageKey;
use crate::conversation::{AccountId, Conversation};
use crate::Result;

impl SyncController {
    /// Rebuilds the account's conversation list from the engine.
    ///
    /// Failures are logged and leave the cached list as it was.
    pub async fn refresh_conversations(&self, account_id: &AccountId) {
        if let Err(e) = self.try_refresh(account_id).await {
            warn!(%account_id, error = %e, "Conversation refresh failed");
        }
    }

    /// Rebuilds the account's conversation list from the engine and returns it.
    ///
    /// The cached entry is replaced only once every conversation was loaded.
    /// Each conversation's last message comes from the message cache, falling
    /// back to the previously cached one; unread counts tracked locally are
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns an error if listing the conversations or loading any one of
    /// them fails; the cache is left untouched in that case.
    pub async fn try_refresh(&self, account_id: &AccountId) -> Result<Arc<Vec<Conversation>>> {
        let engine = &self.inner.engine;

        let own_uri = match engine.account_uri(account_id).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                debug!(%account_id, error = %e, "Own identity unavailable for titles");
                None
            }
        };

        let ids = engine.list_conversation_ids(account_id).await?;
        let previous = self.inner.conversations.get(account_id).unwrap_or_default();

        let mut refreshed = Vec::with_capacity(ids.len());
        for id in ids {
            let info = engine.conversation_info(account_id, &id).await?;
            let members = engine.conversation_members(account_id, &id).await?;

            let mut conversation = Conversation::from_engine(
                account_id.clone(),
                id,
                &info,
                &members,
                own_uri.as_deref(),
                self.inner.config.seconds_threshold,
            );

            let key = MessageKey::new(account_id.clone(), conversation.id.clone());
            conversation.last_message = self.inner.messages.last(&key);

            if let Some(known) = previous.iter().find(|c| c.id == conversation.id) {
                conversation.unread_count = known.unread_count;
                if conversation.last_message.is_none() {
                    conversation.last_message.clone_from(&known.last_message);
                }
                if info.created_at.is_none() {
                    conversation.created_at = known.created_at;
                }
            }

            refreshed.push(conversation);
        }

        let list = self.inner.conversations.replace(account_id, refreshed);
        self.persist_conversations(account_id, &list).await;
        info!(%account_id, count = list.len(), "Refreshed conversations");
        Ok(list)
    }
}
