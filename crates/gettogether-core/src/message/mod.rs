//! Conversation messages.

mod model;
mod repository;

pub use model::{Message, MessageStatus, MessageType, normalize_timestamp};
pub use repository::MessageRepository;
