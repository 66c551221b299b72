//! Per-domain event fan-out.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use super::model::{AccountEvent, CallEvent, ContactEvent, ConversationEvent, EngineEvent};
use crate::config::{DEFAULT_EVENT_CHANNEL_CAPACITY, SyncConfig};

/// Fans engine events out to per-domain channels plus a union channel.
///
/// Each channel holds at most `capacity` items. A subscriber that falls
/// behind loses the oldest items; [`EventBus::publish`] never waits, with or
/// without subscribers. Cloning the bus shares the same channels.
#[derive(Debug, Clone)]
pub struct EventBus {
    capacity: usize,
    account_tx: broadcast::Sender<AccountEvent>,
    contact_tx: broadcast::Sender<ContactEvent>,
    conversation_tx: broadcast::Sender<ConversationEvent>,
    call_tx: broadcast::Sender<CallEvent>,
    all_tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a bus whose channels each hold `capacity` items.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (account_tx, _) = broadcast::channel(capacity);
        let (contact_tx, _) = broadcast::channel(capacity);
        let (conversation_tx, _) = broadcast::channel(capacity);
        let (call_tx, _) = broadcast::channel(capacity);
        let (all_tx, _) = broadcast::channel(capacity);

        Self {
            capacity,
            account_tx,
            contact_tx,
            conversation_tx,
            call_tx,
            all_tx,
        }
    }

    /// Creates a bus sized from the configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.event_channel_capacity)
    }

    /// Capacity of each channel.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publishes an event to its domain channel and the union channel.
    ///
    /// Events nobody listens to are discarded.
    pub fn publish(&self, event: impl Into<EngineEvent>) {
        let event = event.into();
        trace!(?event, "Publishing engine event");

        // Union delivery is best-effort.
        let _ = self.all_tx.send(event.clone());

        match event {
            EngineEvent::Account(e) => {
                let _ = self.account_tx.send(e);
            }
            EngineEvent::Contact(e) => {
                let _ = self.contact_tx.send(e);
            }
            EngineEvent::Conversation(e) => {
                let _ = self.conversation_tx.send(e);
            }
            EngineEvent::Call(e) => {
                let _ = self.call_tx.send(e);
            }
        }
    }

    /// Subscribes to account events.
    #[must_use]
    pub fn subscribe_accounts(&self) -> EventSubscription<AccountEvent> {
        EventSubscription::new("account", self.account_tx.subscribe())
    }

    /// Subscribes to contact events.
    #[must_use]
    pub fn subscribe_contacts(&self) -> EventSubscription<ContactEvent> {
        EventSubscription::new("contact", self.contact_tx.subscribe())
    }

    /// Subscribes to conversation events.
    #[must_use]
    pub fn subscribe_conversations(&self) -> EventSubscription<ConversationEvent> {
        EventSubscription::new("conversation", self.conversation_tx.subscribe())
    }

    /// Subscribes to call events.
    #[must_use]
    pub fn subscribe_calls(&self) -> EventSubscription<CallEvent> {
        EventSubscription::new("call", self.call_tx.subscribe())
    }

    /// Subscribes to every event, for diagnostics.
    #[must_use]
    pub fn subscribe_all(&self) -> EventSubscription<EngineEvent> {
        EventSubscription::new("all", self.all_tx.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

/// Receiving end of one bus channel.
///
/// Gaps caused by overflow are logged and skipped.
#[derive(Debug)]
pub struct EventSubscription<T> {
    channel: &'static str,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> EventSubscription<T> {
    const fn new(channel: &'static str, rx: broadcast::Receiver<T>) -> Self {
        Self { channel, rx }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once every handle to the bus has been dropped and the
    /// buffered events are drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(dropped)) => {
                    warn!(channel = self.channel, dropped, "Subscriber lagged, oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(dropped)) => {
                    warn!(channel = self.channel, dropped, "Subscriber lagged, oldest events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::conversation::{AccountId, ConversationId};

    fn ready(n: usize) -> ConversationEvent {
        ConversationEvent::ConversationReady {
            account_id: AccountId::from("a1"),
            conversation_id: ConversationId::new(format!("c{n}")),
        }
    }

    #[tokio::test]
    async fn test_routes_by_domain() {
        let bus = EventBus::new(8);
        let mut conversations = bus.subscribe_conversations();
        let mut calls = bus.subscribe_calls();
        let mut all = bus.subscribe_all();

        bus.publish(ready(1));
        bus.publish(CallEvent::CallStateChanged {
            account_id: AccountId::from("a1"),
            call_id: "call-1".to_string(),
            state: "RINGING".to_string(),
        });

        assert_eq!(conversations.recv().await.unwrap(), ready(1));
        assert!(conversations.try_recv().is_none());
        assert!(matches!(calls.recv().await.unwrap(), CallEvent::CallStateChanged { .. }));
        assert!(matches!(all.recv().await.unwrap(), EngineEvent::Conversation(_)));
        assert!(matches!(all.recv().await.unwrap(), EngineEvent::Call(_)));
    }

    #[test]
    fn test_publish_without_subscribers_does_not_block() {
        let bus = EventBus::new(2);
        for n in 0..100 {
            bus.publish(ready(n));
        }
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe_conversations();

        for n in 0..10 {
            bus.publish(ready(n));
        }

        let mut received = Vec::new();
        while let Some(event) = sub.try_recv() {
            received.push(event);
        }
        assert_eq!(received, (6..10).map(ready).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe_accounts();
        bus.publish(AccountEvent::AccountsChanged);
        drop(bus);

        assert_eq!(sub.recv().await, Some(AccountEvent::AccountsChanged));
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        assert_eq!(EventBus::new(0).capacity(), 1);
        assert_eq!(EventBus::default().capacity(), 512);
    }
}
