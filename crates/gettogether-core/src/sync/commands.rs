//! Locally initiated commands.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use super::SyncController;
use crate::cache::MessageKey;
use crate::conversation::{AccountId, Conversation, ConversationId};
use crate::message::Message;
use crate::Result;

/// Outcome of [`SyncController::clear_all_conversations`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    /// Contacts removed at the engine.
    pub contacts_removed: usize,
    /// Conversations deleted at the engine.
    pub conversations_deleted: usize,
    /// Engine calls that failed.
    pub failures: usize,
}

impl SyncController {
    /// Sends a text message.
    ///
    /// Once the engine accepts it, a local copy (fresh id, `Sent`, authored
    /// by the account) is appended to the cache and becomes the
    /// conversation's last message.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the message; the cache is left
    /// untouched in that case.
    pub async fn send_message(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message> {
        self.send(account_id, conversation_id, content, None).await
    }

    /// Sends a text message quoting `reply_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the message.
    pub async fn send_reply(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        content: &str,
        reply_to: &str,
    ) -> Result<Message> {
        self.send(account_id, conversation_id, content, Some(reply_to))
            .await
    }

    async fn send(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<Message> {
        let engine_id = self
            .inner
            .engine
            .send_message(account_id, conversation_id, content, reply_to)
            .await?;

        let message = Message::outgoing(
            conversation_id.clone(),
            account_id.as_str(),
            content,
            reply_to.map(ToString::to_string),
        );
        debug!(
            %account_id,
            %conversation_id,
            %engine_id,
            message_id = %message.id,
            "Message sent"
        );

        let key = MessageKey::new(account_id.clone(), conversation_id.clone());
        self.append_message(&key, message.clone()).await;
        Ok(message)
    }

    /// Creates a group conversation, titles it and invites `participant_ids`.
    ///
    /// The new conversation is appended to the cache with no resolved
    /// participants; the next refresh fills them in.
    ///
    /// # Errors
    ///
    /// Returns an error if any engine call fails. The engine may then hold a
    /// partially set up conversation, which a later refresh picks up.
    pub async fn create_group_conversation(
        &self,
        account_id: &AccountId,
        title: &str,
        participant_ids: &[String],
    ) -> Result<Conversation> {
        let engine = &self.inner.engine;
        let conversation_id = engine.create_conversation(account_id).await?;

        let title = title.trim();
        if !title.is_empty() {
            let fields = HashMap::from([("title".to_string(), title.to_string())]);
            engine
                .update_conversation_info(account_id, &conversation_id, &fields)
                .await?;
        }

        for uri in participant_ids {
            engine.add_member(account_id, &conversation_id, uri).await?;
        }

        let conversation = Conversation::new_group(account_id.clone(), conversation_id, title);
        if let Some(list) = self.inner.conversations.append(conversation.clone()) {
            self.persist_conversations(account_id, &list).await;
        }
        info!(
            %account_id,
            conversation_id = %conversation.id,
            invited = participant_ids.len(),
            "Created group conversation"
        );
        Ok(conversation)
    }

    /// Invites `uri` into the conversation, then refreshes the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the invitation.
    pub async fn add_participant(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        uri: &str,
    ) -> Result<()> {
        self.inner
            .engine
            .add_member(account_id, conversation_id, uri)
            .await?;
        self.refresh_conversations(account_id).await;
        Ok(())
    }

    /// Removes `uri` from the conversation, then refreshes the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the removal.
    pub async fn remove_participant(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        uri: &str,
    ) -> Result<()> {
        self.inner
            .engine
            .remove_member(account_id, conversation_id, uri)
            .await?;
        self.refresh_conversations(account_id).await;
        Ok(())
    }

    /// Leaves the conversation and drops it and its messages locally.
    ///
    /// Dropping an already absent conversation is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to delete the conversation; the
    /// caches are left untouched in that case.
    pub async fn leave_conversation(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Result<()> {
        self.inner
            .engine
            .delete_conversation(account_id, conversation_id)
            .await?;

        if let Some(list) = self
            .inner
            .conversations
            .remove_conversation(account_id, conversation_id)
        {
            self.persist_conversations(account_id, &list).await;
        }

        let key = MessageKey::new(account_id.clone(), conversation_id.clone());
        self.inner.messages.remove(&key);
        self.forget_key(&key);
        self.clear_persisted_messages(&key).await;

        info!(%account_id, %conversation_id, "Left conversation");
        Ok(())
    }

    /// Accepts a pending conversation request, then refreshes the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to accept the request.
    pub async fn accept_conversation_request(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Result<()> {
        self.inner
            .engine
            .accept_conversation_request(account_id, conversation_id)
            .await?;
        info!(%account_id, %conversation_id, "Accepted conversation request");
        self.refresh_conversations(account_id).await;
        Ok(())
    }

    /// Declines a pending conversation request.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to decline the request.
    pub async fn decline_conversation_request(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Result<()> {
        self.inner
            .engine
            .decline_conversation_request(account_id, conversation_id)
            .await?;
        info!(%account_id, %conversation_id, "Declined conversation request");
        Ok(())
    }

    /// Publishes the local typing indicator. Failures are only logged.
    pub async fn set_composing(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
        is_composing: bool,
    ) {
        if let Err(e) = self
            .inner
            .engine
            .set_composing(account_id, conversation_id, is_composing)
            .await
        {
            warn!(%account_id, %conversation_id, error = %e, "Failed to publish composing state");
        }
    }

    /// Requests the page of messages preceding the oldest cached one.
    ///
    /// The page arrives as a `MessagesLoaded` event carrying the returned
    /// request id and is put in front of the cached messages. Pages with
    /// other request ids still replace the entry. With nothing cached, the
    /// newest page is requested instead. Returns the engine's request id.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the request.
    pub async fn load_more_messages(
        &self,
        account_id: &AccountId,
        conversation_id: &ConversationId,
    ) -> Result<u32> {
        let key = MessageKey::new(account_id.clone(), conversation_id.clone());
        let oldest = self
            .inner
            .messages
            .get(&key)
            .and_then(|list| list.first().map(|m| m.id.clone()));

        let from_id = oldest.clone().unwrap_or_default();
        // Recorded before the call: the page may be delivered before the
        // engine returns its request id.
        let ticket = oldest.map(|anchor| self.begin_older_page(&key, anchor));

        let result = self
            .inner
            .engine
            .load_messages(
                account_id,
                conversation_id,
                &from_id,
                self.inner.config.history_page_size,
            )
            .await;

        let released = match (&result, ticket) {
            (Ok(request_id), Some(ticket)) => self.confirm_older_page(&key, ticket, *request_id),
            (Err(_), Some(ticket)) => self.abandon_older_page(&key, ticket),
            (_, None) => Vec::new(),
        };
        for (request_id, batch) in released {
            self.apply_page(&key, request_id, batch).await;
        }

        let request_id = result?;
        debug!(%key, %from_id, request_id, "Requested older messages");
        Ok(request_id)
    }

    /// Marks the conversation as read up to its last cached message.
    ///
    /// The local unread count is zeroed only after the engine accepted the
    /// receipt; an engine failure is logged and leaves the count as is.
    pub async fn mark_as_read(&self, account_id: &AccountId, conversation_id: &ConversationId) {
        let key = MessageKey::new(account_id.clone(), conversation_id.clone());

        if let Some(last) = self.inner.messages.last(&key) {
            if let Err(e) = self
                .inner
                .engine
                .mark_displayed(account_id, conversation_id, &last.id)
                .await
            {
                warn!(%key, message_id = %last.id, error = %e, "Failed to mark conversation as read");
                return;
            }
        }

        let updated = self
            .inner
            .conversations
            .update(account_id, conversation_id, |conversation| {
                conversation.unread_count = 0;
            });
        if let Some(list) = updated {
            self.persist_conversations(account_id, &list).await;
        }
    }

    /// Removes every contact and conversation of the account at the engine,
    /// then drops the account from the caches and the store.
    ///
    /// Contacts are the participants of the cached conversations, excluding
    /// the account itself. Each engine call is independent; failures are
    /// counted and do not stop the rest.
    pub async fn clear_all_conversations(&self, account_id: &AccountId) -> ClearSummary {
        let engine = &self.inner.engine;
        let store = &self.inner.store;
        let mut summary = ClearSummary::default();

        let own_uri = match engine.account_uri(account_id).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                warn!(%account_id, error = %e, "Failed to resolve own identity");
                None
            }
        };

        let cached = self.inner.conversations.get(account_id).unwrap_or_default();

        let contacts: BTreeSet<String> = cached
            .iter()
            .flat_map(|conversation| conversation.participant_uris())
            .filter(|uri| *uri != account_id.as_str() && own_uri.as_deref() != Some(*uri))
            .map(ToString::to_string)
            .collect();

        for uri in &contacts {
            match engine.remove_contact(account_id, uri, false).await {
                Ok(()) => {
                    summary.contacts_removed += 1;
                    if let Err(e) = store.delete_contact(account_id, uri).await {
                        warn!(%account_id, %uri, error = %e, "Failed to delete stored contact");
                    }
                }
                Err(e) => {
                    summary.failures += 1;
                    warn!(%account_id, %uri, error = %e, "Failed to remove contact");
                }
            }
        }

        let mut conversation_ids: Vec<ConversationId> =
            cached.iter().map(|c| c.id.clone()).collect();
        match engine.list_conversation_ids(account_id).await {
            Ok(ids) => {
                for id in ids {
                    if !conversation_ids.contains(&id) {
                        conversation_ids.push(id);
                    }
                }
            }
            Err(e) => warn!(%account_id, error = %e, "Failed to list conversations, using cached ids"),
        }

        for conversation_id in &conversation_ids {
            match engine.delete_conversation(account_id, conversation_id).await {
                Ok(()) => summary.conversations_deleted += 1,
                Err(e) => {
                    summary.failures += 1;
                    warn!(%account_id, %conversation_id, error = %e, "Failed to delete conversation");
                }
            }
        }

        self.inner.conversations.remove_account(account_id);
        let mut dropped = self.inner.messages.remove_account(account_id);
        match store.message_conversation_ids(account_id).await {
            Ok(stored) => conversation_ids.extend(stored),
            Err(e) => warn!(%account_id, error = %e, "Failed to list persisted message lists"),
        }
        for id in conversation_ids {
            if !dropped.contains(&id) {
                dropped.push(id);
            }
        }
        for conversation_id in dropped {
            let key = MessageKey::new(account_id.clone(), conversation_id);
            self.forget_key(&key);
            self.clear_persisted_messages(&key).await;
        }
        if let Err(e) = store.clear_conversations(account_id).await {
            warn!(%account_id, error = %e, "Failed to clear persisted conversations");
        }

        info!(
            %account_id,
            contacts_removed = summary.contacts_removed,
            conversations_deleted = summary.conversations_deleted,
            failures = summary.failures,
            "Cleared all conversations"
        );
        summary
    }
}
