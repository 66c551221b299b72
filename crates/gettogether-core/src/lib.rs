//! # gettogether-core
//!
//! Conversation synchronization and local cache engine for the Get-Together
//! client.
//!
//! This crate provides:
//! - **Event Bus** - Per-domain fan-out of messaging-engine events with bounded,
//!   oldest-drop channels
//! - **Caches** - Snapshot-replacing conversation and message caches with live views
//! - **Persistence** - `SQLite` mirror of the caches and contact records
//! - **Synchronization** - Pull (refresh) and push (event) reconciliation plus
//!   optimistic local commands
//! - **Engine seam** - The narrow interface to the external messaging engine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod contacts;
pub mod conversation;
pub mod engine;
mod error;
pub mod event;
pub mod message;
pub mod store;
pub mod sync;

pub use cache::{
    ConversationCache, LiveConversations, LiveList, LiveMessages, MessageCache, MessageKey,
};
pub use config::{SyncConfig, SyncConfigBuilder};
pub use contacts::ContactRecord;
pub use conversation::{AccountId, Conversation, ConversationId, ConversationMode, Participant};
pub use engine::{
    ConversationInfo, EngineError, EngineResult, MemberInfo, MemberRole, MessagingEngine,
};
pub use error::{Error, Result};
pub use event::{
    AccountEvent, CallEvent, ContactEvent, ConversationEvent, EngineEvent, EngineMessage,
    EventBus, EventSubscription, MemberEventKind,
};
pub use message::{Message, MessageStatus, MessageType, normalize_timestamp};
pub use store::{PersistenceGateway, SqliteStore};
pub use sync::{ClearSummary, SyncController};
