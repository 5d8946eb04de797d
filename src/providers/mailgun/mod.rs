//! Mailgun provider.

pub mod client;
pub mod provider;

pub use client::{DEFAULT_API_BASE, MailgunApi, MailgunClient, NewRoute, WebhookSigner};
pub use provider::MailgunProvider;

pub(crate) const PROVIDER_NAME: &str = "mailgun";
