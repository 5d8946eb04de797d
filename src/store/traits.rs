//! `MessageStore`: the persistence seam injected into providers.

use async_trait::async_trait;

use super::model::{Inbox, Message};
use crate::error::StoreError;

/// Backend-agnostic store for inboxes and their messages.
///
/// Implementations must be safe for concurrent use by many webhook handlers.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a newly created inbox.
    async fn save_new_inbox(&self, inbox: &Inbox) -> Result<(), StoreError>;

    /// Look up an inbox by id. A missing inbox is `StoreError::NotFound`.
    async fn get_inbox_by_id(&self, id: &str) -> Result<Inbox, StoreError>;

    /// Persist a received message.
    async fn save_new_message(&self, message: &Message) -> Result<(), StoreError>;

    /// All messages stored for an inbox, oldest first.
    async fn get_messages_by_inbox_id(&self, inbox_id: &str) -> Result<Vec<Message>, StoreError>;
}
