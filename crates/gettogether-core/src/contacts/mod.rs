//! Contact records adjacent to conversations.
//!
//! Only the stable part of a contact is stored. Ban and presence state belong
//! to the engine and are refetched, never read back from disk.

mod model;
mod repository;

pub use model::ContactRecord;
pub use repository::ContactRepository;
