//! Mailgun HTTP API client (Routes API) and webhook signature checking.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{ProviderError, WebhookError};
use crate::providers::join_url;
use crate::providers::routes::{ProviderRoute, RouteDirectory};

use super::PROVIDER_NAME;

/// Default Mailgun API base (US region).
pub const DEFAULT_API_BASE: &str = "https://api.mailgun.net/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type HmacSha256 = Hmac<Sha256>;

/// A route to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoute {
    pub priority: u32,
    /// Free-text description. Carries the route's expiry marker.
    pub description: String,
    pub expression: String,
    pub actions: Vec<String>,
}

/// Mailgun operations the provider depends on.
#[async_trait]
pub trait MailgunApi: RouteDirectory {
    async fn create_route(&self, route: &NewRoute) -> Result<ProviderRoute, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct RouteBody {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    expression: String,
    #[serde(default)]
    actions: Vec<String>,
}

impl From<RouteBody> for ProviderRoute {
    fn from(body: RouteBody) -> Self {
        Self {
            id: body.id,
            metadata: body.description,
            expression: body.expression,
            actions: body.actions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateRouteResponse {
    route: RouteBody,
}

#[derive(Debug, Deserialize)]
struct ListRoutesResponse {
    #[serde(default)]
    items: Vec<RouteBody>,
}

/// reqwest-backed Mailgun client.
pub struct MailgunClient {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
}

impl MailgunClient {
    pub fn new(api_base: impl Into<String>, api_key: SecretString) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| request_failed("build_client", e))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.api_base, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let resp = request
            .basic_auth("api", Some(self.api_key.expose_secret()))
            .send()
            .await
            .map_err(|e| request_failed(operation, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER_NAME.into(),
                operation: operation.into(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RouteDirectory for MailgunClient {
    async fn list_routes(&self, limit: usize) -> Result<Vec<ProviderRoute>, ProviderError> {
        let operation = "list_routes";
        let limit = limit.to_string();
        let request = self
            .client
            .get(self.url("routes"))
            .query(&[("skip", "0"), ("limit", limit.as_str())]);
        let body: ListRoutesResponse = self
            .send(request, operation)
            .await?
            .json()
            .await
            .map_err(|e| invalid_response(operation, e))?;
        Ok(body.items.into_iter().map(ProviderRoute::from).collect())
    }

    async fn delete_route(&self, id: &str) -> Result<(), ProviderError> {
        let request = self.client.delete(self.url(&format!("routes/{id}")));
        self.send(request, "delete_route").await?;
        Ok(())
    }
}

#[async_trait]
impl MailgunApi for MailgunClient {
    async fn create_route(&self, route: &NewRoute) -> Result<ProviderRoute, ProviderError> {
        let operation = "create_route";
        let priority = route.priority.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("priority", priority.as_str()),
            ("description", route.description.as_str()),
            ("expression", route.expression.as_str()),
        ];
        form.extend(route.actions.iter().map(|a| ("action", a.as_str())));

        let request = self.client.post(self.url("routes")).form(&form);
        let body: CreateRouteResponse = self
            .send(request, operation)
            .await?
            .json()
            .await
            .map_err(|e| invalid_response(operation, e))?;
        Ok(body.route.into())
    }
}

fn request_failed(operation: &str, e: reqwest::Error) -> ProviderError {
    ProviderError::RequestFailed {
        provider: PROVIDER_NAME.into(),
        operation: operation.into(),
        reason: e.to_string(),
    }
}

fn invalid_response(operation: &str, e: reqwest::Error) -> ProviderError {
    ProviderError::InvalidResponse {
        provider: PROVIDER_NAME.into(),
        operation: operation.into(),
        reason: e.to_string(),
    }
}

/// Computes and checks Mailgun webhook signatures.
///
/// A signature is the hex HMAC-SHA256 of `timestamp ++ token`, keyed by the
/// account's webhook signing key.
#[derive(Debug, Clone)]
pub struct WebhookSigner {
    key: SecretString,
}

impl WebhookSigner {
    pub fn new(key: SecretString) -> Self {
        Self { key }
    }

    /// Signature Mailgun would attach for `timestamp` and `token`.
    pub fn sign(&self, timestamp: &str, token: &str) -> Result<String, WebhookError> {
        let mut mac = self.mac()?;
        mac.update(timestamp.as_bytes());
        mac.update(token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of a received signature.
    ///
    /// The age of `timestamp` is not checked and tokens are not remembered,
    /// so a captured signed request verifies again if replayed. Replays can
    /// only re-deliver a message Mailgun already sent to that inbox.
    pub fn verify(&self, timestamp: &str, token: &str, signature: &str) -> Result<(), WebhookError> {
        if timestamp.is_empty() || token.is_empty() || signature.is_empty() {
            return Err(WebhookError::Unverified(
                "missing timestamp, token or signature".into(),
            ));
        }
        let expected = hex::decode(signature.trim())
            .map_err(|_| WebhookError::Unverified("signature is not hex".into()))?;

        let mut mac = self.mac()?;
        mac.update(timestamp.as_bytes());
        mac.update(token.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| WebhookError::Unverified("signature mismatch".into()))
    }

    fn mac(&self) -> Result<HmacSha256, WebhookError> {
        HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|e| WebhookError::Unverified(format!("unusable signing key: {e}")))
    }
}
