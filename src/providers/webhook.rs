//! Shared inbound-webhook machinery.
//!
//! Pipeline: blacklist → resolve → normalize → sanitize → persist → acknowledge.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

use super::normalize::{InboundEmail, build_message};
use crate::blacklist::Blacklist;
use crate::error::WebhookError;
use crate::metrics::{EmailAction, IncomingEmailMetrics};
use crate::store::MessageStore;

/// Upper bound on an inbound webhook body. Providers inline the full message.
pub const WEBHOOK_BODY_LIMIT: usize = 25 * 1024 * 1024;

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unverified(_) => StatusCode::UNAUTHORIZED,
            Self::Blacklisted { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::MalformedPayload(_) | Self::InboxResolution { .. } | Self::Content(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Blacklisted { .. } => info!(error = %self, "Inbound email rejected"),
            Self::Unverified(_) => warn!(error = %self, "Inbound webhook refused"),
            _ => error!(error = %self, "Inbound webhook failed"),
        }
        status.into_response()
    }
}

/// Flat view of a webhook's form fields, urlencoded or multipart.
///
/// File parts (attachments) are skipped. When a key repeats, the first value
/// wins. Missing keys read as the empty string.
#[derive(Debug, Clone, Default)]
pub struct WebhookForm(pub HashMap<String, String>);

impl WebhookForm {
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// Take ownership of a field, leaving nothing behind.
    pub fn take(&mut self, key: &str) -> String {
        self.0.remove(key).unwrap_or_default()
    }
}

impl<S> FromRequest<S> for WebhookForm
where
    S: Send + Sync,
{
    type Rejection = WebhookError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

        let mut fields = HashMap::new();

        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| WebhookError::MalformedPayload(e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| WebhookError::MalformedPayload(e.body_text()))?
            {
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let value = field
                    .text()
                    .await
                    .map_err(|e| WebhookError::MalformedPayload(e.body_text()))?;
                fields.entry(name).or_insert(value);
            }
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| WebhookError::MalformedPayload(e.body_text()))?;
            for (key, value) in url::form_urlencoded::parse(&body) {
                fields
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }

        Ok(Self(fields))
    }
}

/// A provider-specific inbound payload, already verified.
pub trait InboundPayload: Send {
    /// The address the blacklist gate inspects.
    fn sender(&self) -> &str;

    /// Map provider fields onto the canonical shape.
    fn into_email(self) -> Result<InboundEmail, WebhookError>;
}

/// Dependencies every webhook handler shares.
#[derive(Clone)]
pub struct WebhookContext {
    pub provider: &'static str,
    pub store: Arc<dyn MessageStore>,
    pub blacklist: Arc<dyn Blacklist>,
    pub metrics: Arc<IncomingEmailMetrics>,
}

impl WebhookContext {
    /// Run a verified payload through the pipeline.
    ///
    /// Returns the inbox id to acknowledge with. A failure to persist is
    /// logged and otherwise ignored: the provider still sees success and will
    /// not redeliver.
    pub async fn accept<P: InboundPayload>(
        &self,
        inbox_id: &str,
        payload: P,
    ) -> Result<String, WebhookError> {
        if self.blacklist.is_blacklisted(payload.sender()) {
            self.metrics.record(EmailAction::Rejected);
            return Err(WebhookError::Blacklisted {
                sender: payload.sender().to_string(),
            });
        }

        let inbox = self
            .store
            .get_inbox_by_id(inbox_id)
            .await
            .map_err(|source| WebhookError::InboxResolution {
                inbox_id: inbox_id.to_string(),
                source,
            })?;

        let email = payload.into_email()?;
        let message = build_message(&inbox, email)?;

        if let Err(e) = self.store.save_new_message(&message).await {
            error!(
                provider = self.provider,
                inbox_id,
                message_id = %message.id,
                error = %e,
                "Failed to save inbound message"
            );
        }

        self.metrics.record(EmailAction::Accepted);
        info!(
            provider = self.provider,
            inbox_id,
            message_id = %message.id,
            "Inbound email accepted"
        );

        Ok(inbox_id.to_string())
    }
}
