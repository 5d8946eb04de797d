//! Inbox/message models, the store trait and an in-memory backend.

pub mod memory;
pub mod model;
pub mod traits;

pub use memory::InMemoryStore;
pub use model::{Inbox, Message};
pub use traits::MessageStore;
