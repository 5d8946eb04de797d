//! Email providers: inbound webhooks and provider-side forwarding routes.
//!
//! Supports:
//! - **Mailgun**: signed webhooks, routes carrying their own expiry
//! - **SendGrid**: Inbound Parse webhooks, no signature and no route expiry
//!
//! The host depends only on [`EmailProvider`]; [`create_provider`] picks the
//! concrete implementation from configuration.

pub mod mailgun;
pub mod normalize;
pub mod routes;
pub mod sanitize;
pub mod sendgrid;
pub mod webhook;

pub use mailgun::MailgunProvider;
pub use routes::{ProviderRoute, RouteDirectory, RouteExpiry, SweepReport, spawn_route_sweeper};
pub use sendgrid::SendgridProvider;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use crate::blacklist::Blacklist;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::metrics::IncomingEmailMetrics;
use crate::store::{Inbox, MessageStore};

/// What a provider needs from the host when it starts.
#[derive(Clone)]
pub struct ProviderDeps {
    /// Public base URL; webhook URLs are built from it.
    pub website_addr: String,
    pub store: Arc<dyn MessageStore>,
    pub blacklist: Arc<dyn Blacklist>,
    pub metrics: Arc<IncomingEmailMetrics>,
}

/// Lifecycle operations the host invokes on the active provider.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Short provider name, used in logs.
    fn name(&self) -> &str;

    /// Wire up the webhook endpoint.
    ///
    /// Returns the router carrying the webhook path; the host merges it into
    /// its own. May only be called once.
    fn start(&self, deps: ProviderDeps) -> Result<Router, ProviderError>;

    /// Release held resources.
    async fn stop(&self) -> Result<(), ProviderError>;

    /// Create the provider-side rule forwarding mail for `inbox` to this
    /// deployment's webhook. Returns the provider-assigned route id.
    async fn register_route(&self, inbox: &Inbox) -> Result<String, ProviderError>;

    /// Remove provider-side routes whose inbox has expired. Best-effort: only
    /// a failure to enumerate routes is returned as an error.
    async fn delete_expired_routes(&self) -> Result<SweepReport, ProviderError>;
}

/// Create the configured provider.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn EmailProvider>, ProviderError> {
    match config {
        ProviderConfig::Mailgun(mg) => {
            tracing::info!(api_base = %mg.api_base, "Using Mailgun");
            Ok(Arc::new(MailgunProvider::from_config(mg)?))
        }
        ProviderConfig::Sendgrid(sg) => {
            tracing::info!(domain = %sg.domain, "Using SendGrid");
            Ok(Arc::new(SendgridProvider::from_config(sg)?))
        }
    }
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
