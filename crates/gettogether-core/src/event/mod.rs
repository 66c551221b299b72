//! Messaging-engine events and their per-domain fan-out.
//!
//! The engine publishes one multiplexed stream of [`EngineEvent`] values.
//! [`EventBus`] republishes each event on the channel of its domain and on a
//! union channel used for diagnostics. Every channel is bounded and drops its
//! oldest items when a subscriber falls behind; publishers never block.

mod bus;
mod model;

pub use bus::{EventBus, EventSubscription};
pub use model::{
    AccountEvent, CallEvent, ContactEvent, ConversationEvent, EngineEvent, EngineMessage,
    MemberEventKind,
};
