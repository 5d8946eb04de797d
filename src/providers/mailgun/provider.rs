//! `EmailProvider` implementation for Mailgun.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::routing::post;

use super::PROVIDER_NAME;
use super::client::{MailgunApi, MailgunClient, NewRoute, WebhookSigner};
use crate::config::MailgunConfig;
use crate::error::{ProviderError, WebhookError};
use crate::providers::normalize::InboundEmail;
use crate::providers::routes::{RouteExpiry, SweepReport, now_epoch, sweep_expired_routes};
use crate::providers::webhook::{InboundPayload, WEBHOOK_BODY_LIMIT, WebhookContext, WebhookForm};
use crate::providers::{EmailProvider, ProviderDeps, join_url};
use crate::store::Inbox;

/// Axum path of the inbound webhook.
pub const WEBHOOK_PATH: &str = "/mg/incoming/{inbox_id}/";

const ROUTE_PRIORITY: u32 = 1;

/// Mailgun-backed provider.
pub struct MailgunProvider {
    api: Arc<dyn MailgunApi>,
    signer: WebhookSigner,
    website_addr: OnceLock<String>,
}

impl MailgunProvider {
    pub fn new(api: Arc<dyn MailgunApi>, signer: WebhookSigner) -> Self {
        Self {
            api,
            signer,
            website_addr: OnceLock::new(),
        }
    }

    pub fn from_config(config: &MailgunConfig) -> Result<Self, ProviderError> {
        let client = MailgunClient::new(config.api_base.clone(), config.api_key.clone())?;
        Ok(Self::new(
            Arc::new(client),
            WebhookSigner::new(config.signing_key.clone()),
        ))
    }

    fn webhook_url(&self, inbox_id: &str) -> Result<String, ProviderError> {
        let base = self
            .website_addr
            .get()
            .ok_or_else(|| ProviderError::NotStarted {
                provider: PROVIDER_NAME.into(),
            })?;
        Ok(join_url(base, &format!("mg/incoming/{inbox_id}/")))
    }
}

#[async_trait]
impl EmailProvider for MailgunProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn start(&self, deps: ProviderDeps) -> Result<Router, ProviderError> {
        self.website_addr
            .set(deps.website_addr.trim_end_matches('/').to_string())
            .map_err(|_| ProviderError::AlreadyStarted {
                provider: PROVIDER_NAME.into(),
            })?;

        let state = Arc::new(MailgunWebhook {
            ctx: WebhookContext {
                provider: PROVIDER_NAME,
                store: deps.store,
                blacklist: deps.blacklist,
                metrics: deps.metrics,
            },
            signer: self.signer.clone(),
        });

        tracing::info!(path = WEBHOOK_PATH, "Mailgun webhook registered");
        Ok(Router::new()
            .route(WEBHOOK_PATH, post(mailgun_incoming))
            .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
            .with_state(state))
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn register_route(&self, inbox: &Inbox) -> Result<String, ProviderError> {
        let forward_to = self.webhook_url(&inbox.id)?;
        let route = NewRoute {
            priority: ROUTE_PRIORITY,
            description: RouteExpiry(inbox.ttl).encode(),
            expression: format!("match_recipient(\"{}\")", inbox.address),
            actions: vec![
                format!("forward(\"{forward_to}\")"),
                "store()".to_string(),
                "stop()".to_string(),
            ],
        };

        let created = self.api.create_route(&route).await?;
        tracing::info!(inbox_id = %inbox.id, route_id = %created.id, "Mailgun route created");
        Ok(created.id)
    }

    async fn delete_expired_routes(&self) -> Result<SweepReport, ProviderError> {
        sweep_expired_routes(self.api.as_ref(), now_epoch()).await
    }
}

// ── Webhook ─────────────────────────────────────────────────────────

struct MailgunWebhook {
    ctx: WebhookContext,
    signer: WebhookSigner,
}

/// Mailgun's forwarded-message form, after signature verification.
struct MailgunPayload(WebhookForm);

impl InboundPayload for MailgunPayload {
    fn sender(&self) -> &str {
        self.0.get("sender")
    }

    fn into_email(self) -> Result<InboundEmail, WebhookError> {
        let mut form = self.0;
        let mut provider_message_id = form.take("message-id");
        if provider_message_id.is_empty() {
            provider_message_id = form.take("Message-Id");
        }
        Ok(InboundEmail {
            provider_message_id,
            sender: form.take("sender"),
            from: form.take("from"),
            subject: form.take("subject"),
            body_plain: form.take("body-plain"),
            body_html: form.take("body-html"),
        })
    }
}

/// POST /mg/incoming/{inbox_id}/
async fn mailgun_incoming(
    State(state): State<Arc<MailgunWebhook>>,
    Path(inbox_id): Path<String>,
    form: Result<WebhookForm, WebhookError>,
) -> Result<String, WebhookError> {
    // An unreadable body cannot carry a valid signature.
    let form = form.map_err(|e| WebhookError::Unverified(e.to_string()))?;
    state.signer.verify(
        form.get("timestamp"),
        form.get("token"),
        form.get("signature"),
    )?;
    state.ctx.accept(&inbox_id, MailgunPayload(form)).await
}
