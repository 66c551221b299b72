//! In-memory conversation and message caches.
//!
//! Both caches map a key to an immutable list that is swapped as a whole on
//! every write. Readers hold `Arc` snapshots and never see a list mid-update.
//! [`LiveList`] follows one key and wakes when its list is replaced.

mod conversations;
mod live;
mod messages;

pub use conversations::{ConversationCache, LiveConversations};
pub use live::{LiveList, Snapshot};
pub use messages::{LiveMessages, MessageCache, MessageKey};
