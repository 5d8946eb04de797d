//! SendGrid provider.

pub mod client;
pub mod provider;

pub use client::{DEFAULT_API_HOST, ParseSetting, SendgridApi, SendgridClient};
pub use provider::SendgridProvider;

pub(crate) const PROVIDER_NAME: &str = "sendgrid";
