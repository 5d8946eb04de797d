//! In-memory `MessageStore` backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::model::{Inbox, Message};
use super::traits::MessageStore;
use crate::error::StoreError;

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    inboxes: RwLock<HashMap<String, Inbox>>,
    messages: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn save_new_inbox(&self, inbox: &Inbox) -> Result<(), StoreError> {
        let mut inboxes = self.inboxes.write().await;
        if inboxes.contains_key(&inbox.id) {
            return Err(StoreError::Conflict {
                entity: "inbox".into(),
                id: inbox.id.clone(),
            });
        }
        inboxes.insert(inbox.id.clone(), inbox.clone());
        debug!(inbox_id = %inbox.id, "Inbox saved");
        Ok(())
    }

    async fn get_inbox_by_id(&self, id: &str) -> Result<Inbox, StoreError> {
        self.inboxes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "inbox".into(),
                id: id.to_string(),
            })
    }

    async fn save_new_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages
            .write()
            .await
            .entry(message.inbox_id.clone())
            .or_default()
            .push(message.clone());
        debug!(inbox_id = %message.inbox_id, message_id = %message.id, "Message saved");
        Ok(())
    }

    async fn get_messages_by_inbox_id(&self, inbox_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages
            .read()
            .await
            .get(inbox_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn message(inbox_id: &str, id: &str) -> Message {
        Message {
            id: id.into(),
            inbox_id: inbox_id.into(),
            ttl: 0,
            received_at: 0,
            provider_message_id: String::new(),
            sender: "a@example.com".into(),
            from: "a@example.com".into(),
            subject: "hi".into(),
            body_plain: "hi".into(),
            body_html: String::new(),
        }
    }

    #[tokio::test]
    async fn inbox_round_trip_and_missing() {
        let store = InMemoryStore::new();
        let inbox = Inbox::new("inbox-1", "x@burner.example", Duration::hours(1));
        store.save_new_inbox(&inbox).await.unwrap();

        assert_eq!(store.get_inbox_by_id("inbox-1").await.unwrap(), inbox);
        assert!(matches!(
            store.get_inbox_by_id("nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_inbox_conflicts() {
        let store = InMemoryStore::new();
        let inbox = Inbox::new("inbox-1", "x@burner.example", Duration::hours(1));
        store.save_new_inbox(&inbox).await.unwrap();
        assert!(matches!(
            store.save_new_inbox(&inbox).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn messages_grouped_by_inbox() {
        let store = InMemoryStore::new();
        store.save_new_message(&message("a", "1")).await.unwrap();
        store.save_new_message(&message("a", "2")).await.unwrap();
        store.save_new_message(&message("b", "3")).await.unwrap();

        let a = store.get_messages_by_inbox_id("a").await.unwrap();
        assert_eq!(a.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["1", "2"]);
        assert_eq!(store.get_messages_by_inbox_id("b").await.unwrap().len(), 1);
        assert!(store.get_messages_by_inbox_id("c").await.unwrap().is_empty());
    }
}
