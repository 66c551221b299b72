//! Conversation synchronization.
//!
//! [`SyncController`] keeps the conversation and message caches consistent
//! with the messaging engine. It reconciles in two directions:
//!
//! - **pull**: [`SyncController::refresh_conversations`] rebuilds an account's
//!   conversation list from the engine;
//! - **push**: [`SyncController::handle_event`] applies conversation events
//!   drained from the [`EventBus`].
//!
//! Local commands (send, create, leave, ...) go to the engine first and update
//! the caches optimistically once the engine accepted them. Every cache write
//! is followed by a write to the [`PersistenceGateway`]; persistence failures
//! are logged and never roll the cache back.

mod commands;
mod events;
mod refresh;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

pub use commands::ClearSummary;

use crate::cache::{ConversationCache, LiveConversations, LiveMessages, MessageCache, MessageKey};
use crate::config::SyncConfig;
use crate::conversation::{AccountId, Conversation, ConversationId};
use crate::engine::MessagingEngine;
use crate::event::{ConversationEvent, EventBus, EventSubscription};
use crate::message::Message;
use crate::store::PersistenceGateway;

/// Coordinates the engine, the caches and the persistence gateway.
///
/// Cloning is cheap; clones share the same caches.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Arc<dyn MessagingEngine>,
    store: Arc<dyn PersistenceGateway>,
    conversations: ConversationCache,
    messages: MessageCache,
    config: SyncConfig,
    /// Older pages in flight per key.
    older_pages: Mutex<HashMap<MessageKey, OlderPages>>,
    next_ticket: AtomicU64,
    /// Keys whose history was requested from the engine.
    opened: Mutex<HashSet<MessageKey>>,
}

/// Older pages requested for one key.
#[derive(Debug, Default)]
struct OlderPages {
    requests: Vec<OlderRequest>,
    /// Batches that arrived while a request id was still unknown, in
    /// arrival order.
    parked: Vec<(u32, Vec<Message>)>,
}

#[derive(Debug)]
struct OlderRequest {
    ticket: u64,
    /// Oldest cached message id when the page was requested.
    anchor: String,
    /// Engine request id, once the engine returned it.
    request_id: Option<u32>,
}

impl OlderPages {
    fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.parked.is_empty()
    }

    /// Parked batches, once every request id is known.
    fn release(&mut self) -> Vec<(u32, Vec<Message>)> {
        if self.requests.iter().any(|r| r.request_id.is_none()) {
            return Vec::new();
        }
        std::mem::take(&mut self.parked)
    }
}

/// Where a `MessagesLoaded` batch goes.
enum Page {
    /// Newest messages; replace the entry.
    Latest(Vec<Message>),
    /// A requested older page, put in front of `anchor`.
    Older { anchor: String, batch: Vec<Message> },
    /// Held until the pending request ids are known.
    Parked,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SyncController {
    /// Creates a controller with empty caches.
    #[must_use]
    pub fn new(
        engine: Arc<dyn MessagingEngine>,
        store: Arc<dyn PersistenceGateway>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                store,
                conversations: ConversationCache::new(),
                messages: MessageCache::new(),
                config,
                older_pages: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(0),
                opened: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// The conversation cache.
    #[must_use]
    pub fn conversation_cache(&self) -> &ConversationCache {
        &self.inner.conversations
    }

    /// The message cache.
    #[must_use]
    pub fn message_cache(&self) -> &MessageCache {
        &self.inner.messages
    }

    /// Live view of the account's conversations.
    ///
    /// When the account is not cached yet, a background load installs the
    /// persisted list (if the entry is still absent) and then refreshes from
    /// the engine. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn conversations(&self, account_id: &AccountId) -> LiveConversations {
        let live = self.inner.conversations.watch(account_id.clone());
        if !self.inner.conversations.contains(account_id) {
            let this = self.clone();
            let account_id = account_id.clone();
            tokio::spawn(async move { this.load_conversations(&account_id).await });
        }
        live
    }

    /// Live view of one conversation's messages.
    ///
    /// The first view of a conversation starts a background load: it
    /// installs the persisted messages (if the entry is still absent) and
    /// asks the engine for the newest page, which arrives as
    /// `MessagesLoaded`. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn messages(&self, account_id: &AccountId, conversation_id: &ConversationId) -> LiveMessages {
        let key = MessageKey::new(account_id.clone(), conversation_id.clone());
        let live = self.inner.messages.watch(key.clone());
        if lock(&self.inner.opened).insert(key.clone()) {
            let this = self.clone();
            tokio::spawn(async move { this.load_messages(&key).await });
        }
        live
    }

    /// Applies conversation events from `subscription` until the bus closes.
    pub async fn run(&self, mut subscription: EventSubscription<ConversationEvent>) {
        while let Some(event) = subscription.recv().await {
            trace!(
                account_id = %event.account_id(),
                conversation_id = %event.conversation_id(),
                "Handling conversation event"
            );
            self.handle_event(event).await;
        }
        debug!("Conversation channel closed, sync loop stopped");
    }

    /// Subscribes to the bus's conversation channel and runs the event loop
    /// on a new task.
    #[must_use]
    pub fn spawn(&self, bus: &EventBus) -> JoinHandle<()> {
        let subscription = bus.subscribe_conversations();
        let this = self.clone();
        tokio::spawn(async move { this.run(subscription).await })
    }

    /// Creates an event bus sized from the configuration and runs the event
    /// loop on it.
    ///
    /// The engine adapter publishes into the returned bus; the loop stops
    /// once every clone of it is dropped.
    #[must_use]
    pub fn start(&self) -> (EventBus, JoinHandle<()>) {
        let bus = EventBus::from_config(&self.inner.config);
        let task = self.spawn(&bus);
        (bus, task)
    }

    async fn load_conversations(&self, account_id: &AccountId) {
        match self.inner.store.load_conversations(account_id).await {
            Ok(stored) => {
                let count = stored.len();
                if !stored.is_empty() && self.inner.conversations.insert_if_absent(account_id, stored) {
                    debug!(%account_id, count, "Installed persisted conversations");
                }
            }
            Err(e) => warn!(%account_id, error = %e, "Failed to load persisted conversations"),
        }

        self.refresh_conversations(account_id).await;
    }

    async fn load_messages(&self, key: &MessageKey) {
        self.restore_messages(key).await;

        match self
            .inner
            .engine
            .load_messages(
                &key.account_id,
                &key.conversation_id,
                "",
                self.inner.config.history_page_size,
            )
            .await
        {
            Ok(request_id) => debug!(%key, request_id, "Requested message history"),
            Err(e) => warn!(%key, error = %e, "Failed to request message history"),
        }
    }

    /// Installs the persisted messages unless the key already has an entry.
    async fn restore_messages(&self, key: &MessageKey) {
        match self
            .inner
            .store
            .load_messages(&key.account_id, &key.conversation_id)
            .await
        {
            Ok(stored) => {
                let count = stored.len();
                if self.inner.messages.insert_if_absent(key, stored) {
                    debug!(%key, count, "Installed persisted messages");
                }
            }
            Err(e) => warn!(%key, error = %e, "Failed to load persisted messages"),
        }
    }

    /// Appends `message` unless its id is cached, then mirrors it.
    ///
    /// A key without an entry starts from its persisted messages, so the
    /// save that follows never drops stored history.
    ///
    /// Returns whether the message was appended.
    async fn append_message(&self, key: &MessageKey, message: Message) -> bool {
        if !self.inner.messages.contains(key) {
            self.restore_messages(key).await;
        }
        let Some(list) = self.inner.messages.append(key, message.clone()) else {
            debug!(%key, message_id = %message.id, "Duplicate message ignored");
            return false;
        };
        self.persist_messages(key, &list).await;
        self.set_last_message(key, message).await;
        true
    }

    /// Applies a loaded batch as the newest page or as a requested older
    /// page, depending on `request_id`.
    async fn apply_page(&self, key: &MessageKey, request_id: u32, batch: Vec<Message>) {
        match self.route_page(key, request_id, batch) {
            Page::Latest(batch) => {
                let list = self.inner.messages.replace(key, batch);
                debug!(%key, request_id, count = list.len(), "Loaded messages");
                self.persist_messages(key, &list).await;
                if let Some(last) = list.last() {
                    self.set_last_message(key, last.clone()).await;
                }
            }
            Page::Older { anchor, batch } => {
                match self.inner.messages.prepend(key, &anchor, batch) {
                    Some(list) => {
                        debug!(%key, request_id, count = list.len(), "Prepended older messages");
                        self.persist_messages(key, &list).await;
                    }
                    None => debug!(%key, request_id, %anchor, "Older page no longer fits, dropped"),
                }
            }
            Page::Parked => trace!(%key, request_id, "Holding page until its request id is known"),
        }
    }

    /// Points the conversation's `last_message` at `message`, if it is cached.
    async fn set_last_message(&self, key: &MessageKey, message: Message) {
        let updated = self
            .inner
            .conversations
            .update(&key.account_id, &key.conversation_id, |conversation| {
                conversation.last_message = Some(message);
            });
        if let Some(list) = updated {
            self.persist_conversations(&key.account_id, &list).await;
        }
    }

    async fn persist_conversations(&self, account_id: &AccountId, conversations: &[Conversation]) {
        if let Err(e) = self
            .inner
            .store
            .save_conversations(account_id, conversations)
            .await
        {
            warn!(%account_id, error = %e, "Failed to persist conversations");
        }
    }

    async fn persist_messages(&self, key: &MessageKey, messages: &[Message]) {
        if let Err(e) = self
            .inner
            .store
            .save_messages(&key.account_id, &key.conversation_id, messages)
            .await
        {
            warn!(%key, error = %e, "Failed to persist messages");
        }
    }

    async fn clear_persisted_messages(&self, key: &MessageKey) {
        if let Err(e) = self
            .inner
            .store
            .clear_messages(&key.account_id, &key.conversation_id)
            .await
        {
            warn!(%key, error = %e, "Failed to clear persisted messages");
        }
    }

    fn route_page(&self, key: &MessageKey, request_id: u32, batch: Vec<Message>) -> Page {
        let mut pending = lock(&self.inner.older_pages);
        let Some(pages) = pending.get_mut(key) else {
            return Page::Latest(batch);
        };

        if let Some(index) = pages
            .requests
            .iter()
            .position(|r| r.request_id == Some(request_id))
        {
            let request = pages.requests.remove(index);
            if pages.is_empty() {
                pending.remove(key);
            }
            return Page::Older {
                anchor: request.anchor,
                batch,
            };
        }

        if pages.requests.iter().any(|r| r.request_id.is_none()) {
            pages.parked.push((request_id, batch));
            return Page::Parked;
        }
        Page::Latest(batch)
    }

    /// Records that an older page preceding `anchor` is being fetched.
    ///
    /// Returns the ticket that confirms or abandons the request.
    fn begin_older_page(&self, key: &MessageKey, anchor: String) -> u64 {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.older_pages)
            .entry(key.clone())
            .or_default()
            .requests
            .push(OlderRequest {
                ticket,
                anchor,
                request_id: None,
            });
        ticket
    }

    /// Attaches the engine's request id to the ticket and returns the
    /// batches that can now be routed.
    fn confirm_older_page(&self, key: &MessageKey, ticket: u64, request_id: u32) -> Vec<(u32, Vec<Message>)> {
        let mut pending = lock(&self.inner.older_pages);
        let Some(pages) = pending.get_mut(key) else {
            return Vec::new();
        };
        if let Some(request) = pages.requests.iter_mut().find(|r| r.ticket == ticket) {
            request.request_id = Some(request_id);
        }
        pages.release()
    }

    /// Drops a request the engine refused and returns the batches that can
    /// now be routed.
    fn abandon_older_page(&self, key: &MessageKey, ticket: u64) -> Vec<(u32, Vec<Message>)> {
        let mut pending = lock(&self.inner.older_pages);
        let Some(pages) = pending.get_mut(key) else {
            return Vec::new();
        };
        pages.requests.retain(|r| r.ticket != ticket);
        let released = pages.release();
        if pages.is_empty() {
            pending.remove(key);
        }
        released
    }

    /// Forgets the key's pending pages and opened state.
    fn forget_key(&self, key: &MessageKey) {
        lock(&self.inner.older_pages).remove(key);
        lock(&self.inner.opened).remove(key);
    }
}
