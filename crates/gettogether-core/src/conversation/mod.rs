//! Conversations and their participants.

mod model;
mod repository;

pub use model::{AccountId, Conversation, ConversationId, ConversationMode, Participant};
pub use repository::ConversationRepository;
