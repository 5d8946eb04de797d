//! `EmailProvider` implementation for SendGrid Inbound Parse.
//!
//! SendGrid posts inbound mail unsigned and parse settings have no field to
//! carry an expiry, so this provider neither verifies webhooks nor sweeps.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::routing::post;
use mail_parser::MessageParser;
use serde::Deserialize;

use super::PROVIDER_NAME;
use super::client::{SendgridApi, SendgridClient};
use crate::config::SendgridConfig;
use crate::error::{ProviderError, WebhookError};
use crate::providers::normalize::{InboundEmail, parse_mailbox_address};
use crate::providers::routes::SweepReport;
use crate::providers::webhook::{InboundPayload, WEBHOOK_BODY_LIMIT, WebhookContext, WebhookForm};
use crate::providers::{EmailProvider, ProviderDeps, join_url};
use crate::store::Inbox;

/// Axum path of the inbound webhook.
pub const WEBHOOK_PATH: &str = "/sg/incoming/{inbox_id}/";

/// SendGrid-backed provider.
pub struct SendgridProvider {
    api: Arc<dyn SendgridApi>,
    /// Receiving domain; stands in for the route id when the API omits it.
    domain: String,
    website_addr: OnceLock<String>,
}

impl SendgridProvider {
    pub fn new(api: Arc<dyn SendgridApi>, domain: impl Into<String>) -> Self {
        Self {
            api,
            domain: domain.into(),
            website_addr: OnceLock::new(),
        }
    }

    pub fn from_config(config: &SendgridConfig) -> Result<Self, ProviderError> {
        let client = SendgridClient::new(
            config.api_host.clone(),
            config.domain.clone(),
            config.api_key.clone(),
        )?;
        Ok(Self::new(Arc::new(client), config.domain.clone()))
    }
}

#[async_trait]
impl EmailProvider for SendgridProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn start(&self, deps: ProviderDeps) -> Result<Router, ProviderError> {
        self.website_addr
            .set(deps.website_addr.trim_end_matches('/').to_string())
            .map_err(|_| ProviderError::AlreadyStarted {
                provider: PROVIDER_NAME.into(),
            })?;

        let ctx = Arc::new(WebhookContext {
            provider: PROVIDER_NAME,
            store: deps.store,
            blacklist: deps.blacklist,
            metrics: deps.metrics,
        });

        tracing::info!(path = WEBHOOK_PATH, "SendGrid webhook registered");
        Ok(Router::new()
            .route(WEBHOOK_PATH, post(sendgrid_incoming))
            .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
            .with_state(ctx))
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn register_route(&self, inbox: &Inbox) -> Result<String, ProviderError> {
        let base = self
            .website_addr
            .get()
            .ok_or_else(|| ProviderError::NotStarted {
                provider: PROVIDER_NAME.into(),
            })?;
        let url = join_url(base, &format!("sg/incoming/{}/", inbox.id));

        let setting = self.api.create_parse_setting(&url).await?;
        let route_id = if setting.hostname.is_empty() {
            self.domain.clone()
        } else {
            setting.hostname
        };
        tracing::info!(inbox_id = %inbox.id, route_id = %route_id, "SendGrid parse setting created");
        Ok(route_id)
    }

    async fn delete_expired_routes(&self) -> Result<SweepReport, ProviderError> {
        tracing::debug!("SendGrid parse settings carry no expiry; nothing to sweep");
        Ok(SweepReport::default())
    }
}

// ── Webhook ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    from: String,
}

/// SendGrid's Inbound Parse form with its decoded envelope.
struct SendgridPayload {
    envelope: Envelope,
    form: WebhookForm,
}

impl SendgridPayload {
    fn from_form(form: WebhookForm) -> Result<Self, WebhookError> {
        let envelope = serde_json::from_str(form.get("envelope"))
            .map_err(|e| WebhookError::MalformedPayload(format!("envelope: {e}")))?;
        Ok(Self { envelope, form })
    }
}

impl InboundPayload for SendgridPayload {
    fn sender(&self) -> &str {
        &self.envelope.from
    }

    fn into_email(self) -> Result<InboundEmail, WebhookError> {
        let mut form = self.form;
        let from = parse_mailbox_address(form.get("from")).ok_or_else(|| {
            WebhookError::MalformedPayload(format!("unparseable from address: {:?}", form.get("from")))
        })?;
        Ok(InboundEmail {
            provider_message_id: message_id_from_headers(form.get("headers")).unwrap_or_default(),
            sender: self.envelope.from,
            from,
            subject: form.take("subject"),
            body_plain: form.take("text"),
            body_html: form.take("html"),
        })
    }
}

/// Pull the Message-ID out of the raw header block SendGrid forwards.
fn message_id_from_headers(headers: &str) -> Option<String> {
    if headers.trim().is_empty() {
        return None;
    }
    let raw = format!("{}\r\n\r\n", headers.trim_end());
    let message = MessageParser::default().parse(raw.as_bytes())?;
    message.message_id().map(str::to_string)
}

/// POST /sg/incoming/{inbox_id}/
async fn sendgrid_incoming(
    State(ctx): State<Arc<WebhookContext>>,
    Path(inbox_id): Path<String>,
    form: WebhookForm,
) -> Result<String, WebhookError> {
    let payload = SendgridPayload::from_form(form)?;
    ctx.accept(&inbox_id, payload).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Duration;

    use super::*;
    use crate::blacklist::SenderBlacklist;
    use crate::metrics::IncomingEmailMetrics;
    use crate::providers::sendgrid::ParseSetting;
    use crate::store::InMemoryStore;

    #[derive(Default)]
    struct FakeSendgrid {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SendgridApi for FakeSendgrid {
        async fn create_parse_setting(&self, url: &str) -> Result<ParseSetting, ProviderError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(ParseSetting {
                hostname: "in.burner.example".into(),
                url: url.to_string(),
                spam_check: false,
                send_raw: false,
            })
        }
    }

    fn deps() -> ProviderDeps {
        ProviderDeps {
            website_addr: "https://burner.example".into(),
            store: Arc::new(InMemoryStore::new()),
            blacklist: Arc::new(SenderBlacklist::default()),
            metrics: Arc::new(IncomingEmailMetrics::new()),
        }
    }

    fn form(pairs: &[(&str, &str)]) -> WebhookForm {
        WebhookForm(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn register_route_points_parse_setting_at_inbox_webhook() {
        let api = Arc::new(FakeSendgrid::default());
        let sg = SendgridProvider::new(Arc::clone(&api) as Arc<dyn SendgridApi>, "in.burner.example");
        let _router = sg.start(deps()).unwrap();

        let inbox = Inbox::new("4d45c7c3", "rober@in.burner.example", Duration::hours(1));
        let route_id = sg.register_route(&inbox).await.unwrap();

        assert_eq!(route_id, "in.burner.example");
        assert_eq!(
            *api.urls.lock().unwrap(),
            vec!["https://burner.example/sg/incoming/4d45c7c3/".to_string()]
        );
    }

    #[tokio::test]
    async fn register_before_start_fails() {
        let sg = SendgridProvider::new(Arc::new(FakeSendgrid::default()), "in.burner.example");
        let inbox = Inbox::new("id", "a@in.burner.example", Duration::hours(1));
        assert!(matches!(
            sg.register_route(&inbox).await,
            Err(ProviderError::NotStarted { .. })
        ));
    }

    #[tokio::test]
    async fn sweep_is_a_no_op() {
        let sg = SendgridProvider::new(Arc::new(FakeSendgrid::default()), "in.burner.example");
        assert_eq!(sg.delete_expired_routes().await.unwrap(), SweepReport::default());
    }

    #[test]
    fn payload_uses_envelope_sender_and_bare_from() {
        let payload = SendgridPayload::from_form(form(&[
            ("envelope", r#"{"to":["rober@in.burner.example"],"from":"david@example.com"}"#),
            ("from", "David López <david@example.com>"),
            ("subject", "Hello world"),
            ("text", "Hola mundo!"),
            ("html", "<p>Hola</p>"),
            ("headers", "Message-ID: <abc@mx.example.com>\nSubject: Hello world"),
        ]))
        .unwrap();

        assert_eq!(payload.sender(), "david@example.com");
        let email = payload.into_email().unwrap();
        assert_eq!(email.sender, "david@example.com");
        assert_eq!(email.from, "david@example.com");
        assert_eq!(email.subject, "Hello world");
        assert_eq!(email.body_plain, "Hola mundo!");
        assert_eq!(email.body_html, "<p>Hola</p>");
        assert_eq!(email.provider_message_id, "abc@mx.example.com");
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let err = SendgridPayload::from_form(form(&[("envelope", "{not json")])).err().unwrap();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn missing_envelope_is_rejected() {
        assert!(SendgridPayload::from_form(form(&[("from", "a@example.com")])).is_err());
    }

    #[test]
    fn unparseable_from_is_rejected() {
        let payload = SendgridPayload::from_form(form(&[
            ("envelope", r#"{"from":"david@example.com"}"#),
            ("from", ""),
        ]))
        .unwrap();
        assert!(matches!(
            payload.into_email(),
            Err(WebhookError::MalformedPayload(_))
        ));
    }
}
