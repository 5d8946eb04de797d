//! Inbox and message records.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// A disposable, TTL-bounded inbox owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    pub id: String,
    pub address: String,
    /// Creation instant, epoch seconds.
    pub created_at: i64,
    /// Absolute expiry instant, epoch seconds.
    pub ttl: i64,
    /// Provider-assigned forwarding rule id. Empty until registration succeeds.
    #[serde(default)]
    pub route_id: String,
    /// Set by the host when route registration fails.
    #[serde(default)]
    pub failed_to_create: bool,
}

impl Inbox {
    /// Create an inbox that expires `lifetime` from now.
    pub fn new(id: impl Into<String>, address: impl Into<String>, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            address: address.into(),
            created_at: now.timestamp(),
            ttl: (now + lifetime).timestamp(),
            route_id: String::new(),
            failed_to_create: false,
        }
    }
}

/// One inbound email, normalized across providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub inbox_id: String,
    /// Copied from the owning inbox at receipt time.
    pub ttl: i64,
    /// Receipt instant, epoch seconds. Set on arrival, not from provider headers.
    pub received_at: i64,
    /// The provider's own message identifier. Opaque.
    #[serde(default)]
    pub provider_message_id: String,
    pub sender: String,
    pub from: String,
    pub subject: String,
    pub body_plain: String,
    /// Empty unless the inbound payload carried a non-empty HTML body.
    #[serde(default)]
    pub body_html: String,
}
