//! Provider-agnostic inbound fields and their mapping onto `Message`.

use chrono::Utc;
use mail_parser::{Address, MessageParser};
use uuid::Uuid;

use super::sanitize::rewrite_anchor_targets;
use crate::error::SanitizeError;
use crate::store::{Inbox, Message};

/// Canonical fields of an inbound email, after provider-specific extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEmail {
    pub provider_message_id: String,
    /// Envelope sender. This is the address the blacklist gate inspects.
    pub sender: String,
    pub from: String,
    pub subject: String,
    pub body_plain: String,
    pub body_html: String,
}

/// Build the stored message for `inbox`.
///
/// The id is fresh, `received_at` is now, and the TTL is inherited from the
/// inbox. HTML is rewritten only when present, so plaintext-only mail never
/// gains an empty HTML document.
pub fn build_message(inbox: &Inbox, email: InboundEmail) -> Result<Message, SanitizeError> {
    let body_html = if email.body_html.is_empty() {
        String::new()
    } else {
        rewrite_anchor_targets(&email.body_html)?
    };

    Ok(Message {
        id: Uuid::new_v4().to_string(),
        inbox_id: inbox.id.clone(),
        ttl: inbox.ttl,
        received_at: Utc::now().timestamp(),
        provider_message_id: email.provider_message_id,
        sender: email.sender,
        from: email.from,
        subject: email.subject,
        body_plain: email.body_plain,
        body_html,
    })
}

/// Extract the bare address from an RFC 5322 mailbox such as
/// `David López <david@example.com>`.
///
/// Returns `None` when no address can be found.
pub fn parse_mailbox_address(raw: &str) -> Option<String> {
    let value: String = raw
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let header = format!("From: {value}\r\n\r\n");
    let message = MessageParser::default().parse(header.as_bytes())?;

    let address = match message.from()? {
        Address::List(addrs) => addrs.iter().find_map(|a| a.address.as_deref()),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter())
            .find_map(|a| a.address.as_deref()),
    }?;

    let address = address.trim();
    if address.contains('@') && !address.contains(char::is_whitespace) {
        Some(address.to_string())
    } else {
        None
    }
}
