//! Blacklist gate: a predicate over sender addresses.

/// Decides whether inbound mail from `sender` must be refused.
///
/// Implementations are shared across concurrent webhook handlers.
pub trait Blacklist: Send + Sync {
    fn is_blacklisted(&self, sender: &str) -> bool;
}

impl<F> Blacklist for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_blacklisted(&self, sender: &str) -> bool {
        self(sender)
    }
}

/// List-backed blacklist.
///
/// - Empty list → nothing is blacklisted
/// - `@domain.com` or `domain.com` → domain match
/// - `user@domain.com` → exact address match
///
/// Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct SenderBlacklist {
    entries: Vec<String>,
}

impl SenderBlacklist {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }
}

impl Blacklist for SenderBlacklist {
    fn is_blacklisted(&self, sender: &str) -> bool {
        is_sender_listed(&self.entries, sender)
    }
}

/// Check an address against a list of blacklist entries.
fn is_sender_listed(entries: &[String], email: &str) -> bool {
    let email_lower = email.trim().to_lowercase();
    if email_lower.is_empty() {
        return false;
    }
    entries.iter().any(|entry| {
        let entry = entry.trim().to_lowercase();
        if entry.is_empty() {
            false
        } else if entry.starts_with('@') {
            email_lower.ends_with(&entry)
        } else if entry.contains('@') {
            entry == email_lower
        } else {
            email_lower.ends_with(&format!("@{entry}"))
        }
    })
}
