//! Push-based reconciliation from conversation events.

use std::collections::HashMap;

use tracing::{debug, info, trace};

use super::SyncController;
use crate::cache::MessageKey;
use crate::conversation::{AccountId, ConversationId};
use crate::event::{ConversationEvent, EngineMessage};
use crate::message::Message;

impl SyncController {
    /// Applies one conversation event to the caches.
    ///
    /// Events may be duplicated or reordered; applying one twice leaves the
    /// caches as applying it once.
    pub async fn handle_event(&self, event: ConversationEvent) {
        match event {
            ConversationEvent::MessageReceived {
                account_id,
                conversation_id,
                message,
            } => {
                self.on_message_received(account_id, conversation_id, &message)
                    .await;
            }
            ConversationEvent::MessageUpdated {
                account_id,
                conversation_id,
                message,
            } => {
                self.on_message_updated(account_id, conversation_id, &message)
                    .await;
            }
            ConversationEvent::MessagesLoaded {
                account_id,
                conversation_id,
                request_id,
                messages,
            } => {
                self.on_messages_loaded(account_id, conversation_id, request_id, &messages)
                    .await;
            }
            ConversationEvent::ConversationReady {
                account_id,
                conversation_id,
            } => {
                debug!(%account_id, %conversation_id, "Conversation ready");
                self.refresh_conversations(&account_id).await;
            }
            ConversationEvent::ConversationRemoved {
                account_id,
                conversation_id,
            } => {
                if let Some(list) = self
                    .inner
                    .conversations
                    .remove_conversation(&account_id, &conversation_id)
                {
                    self.persist_conversations(&account_id, &list).await;
                    info!(%account_id, %conversation_id, "Conversation removed");
                }
            }
            ConversationEvent::ConversationRequestReceived {
                account_id,
                conversation_id,
                metadata,
            } => {
                info!(
                    %account_id,
                    %conversation_id,
                    fields = metadata.len(),
                    "Conversation request received"
                );
            }
            ConversationEvent::ConversationMemberEvent {
                account_id,
                conversation_id,
                member_uri,
                event_type,
            } => {
                debug!(%account_id, %conversation_id, %member_uri, ?event_type, "Membership changed");
                self.refresh_conversations(&account_id).await;
            }
            ConversationEvent::ComposingStatusChanged {
                account_id,
                conversation_id,
                from,
                is_composing,
            } => {
                trace!(%account_id, %conversation_id, %from, is_composing, "Composing status");
            }
            ConversationEvent::ConversationProfileUpdated {
                account_id,
                conversation_id,
                profile,
            } => {
                self.on_profile_updated(&account_id, &conversation_id, &profile)
                    .await;
            }
        }
    }

    async fn on_message_received(
        &self,
        account_id: AccountId,
        conversation_id: ConversationId,
        raw: &EngineMessage,
    ) {
        let Some(message) =
            Message::from_engine(&conversation_id, raw, self.inner.config.seconds_threshold)
        else {
            debug!(%account_id, %conversation_id, message_id = %raw.id, "Dropped message without body");
            return;
        };

        let key = MessageKey::new(account_id, conversation_id);
        self.append_message(&key, message).await;
    }

    async fn on_message_updated(
        &self,
        account_id: AccountId,
        conversation_id: ConversationId,
        raw: &EngineMessage,
    ) {
        let Some(message) =
            Message::from_engine(&conversation_id, raw, self.inner.config.seconds_threshold)
        else {
            debug!(%account_id, %conversation_id, message_id = %raw.id, "Dropped malformed update");
            return;
        };

        let key = MessageKey::new(account_id, conversation_id);
        let Some(list) = self.inner.messages.update_message(&key, message.clone()) else {
            trace!(%key, message_id = %message.id, "Update for unknown or unchanged message");
            return;
        };
        self.persist_messages(&key, &list).await;

        let points_at_update = self
            .inner
            .conversations
            .find(&key.account_id, &key.conversation_id)
            .and_then(|conversation| conversation.last_message)
            .is_some_and(|last| last.id == message.id);
        if points_at_update {
            self.set_last_message(&key, message).await;
        }
    }

    async fn on_messages_loaded(
        &self,
        account_id: AccountId,
        conversation_id: ConversationId,
        request_id: u32,
        raw: &[EngineMessage],
    ) {
        let threshold = self.inner.config.seconds_threshold;
        let batch: Vec<Message> = raw
            .iter()
            .filter_map(|m| Message::from_engine(&conversation_id, m, threshold))
            .collect();
        let dropped = raw.len() - batch.len();
        if dropped > 0 {
            debug!(%account_id, %conversation_id, request_id, dropped, "Dropped malformed messages");
        }

        let key = MessageKey::new(account_id, conversation_id);
        self.apply_page(&key, request_id, batch).await;
    }

    async fn on_profile_updated(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        profile: &HashMap<String, String>,
    ) {
        let Some(title) = profile
            .get("title")
            .map(|t| t.as_str().trim())
            .filter(|t| !t.is_empty())
        else {
            return;
        };

        let updated = self
            .inner
            .conversations
            .update(account_id, conversation_id, |conversation| {
                conversation.title = title.to_string();
            });
        if let Some(list) = updated {
            debug!(%account_id, %conversation_id, %title, "Conversation title updated");
            self.persist_conversations(account_id, &list).await;
        }
    }
}
