//! SendGrid Inbound Parse settings API client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::providers::join_url;

use super::PROVIDER_NAME;

pub const DEFAULT_API_HOST: &str = "https://api.sendgrid.com";

const PARSE_SETTINGS_PATH: &str = "v3/user/webhooks/parse/settings";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An Inbound Parse setting: mail for `hostname` is posted to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSetting {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub spam_check: bool,
    #[serde(default)]
    pub send_raw: bool,
}

/// SendGrid operations the provider depends on.
#[async_trait]
pub trait SendgridApi: Send + Sync {
    async fn create_parse_setting(&self, url: &str) -> Result<ParseSetting, ProviderError>;
}

/// reqwest-backed SendGrid client bound to one receiving domain.
pub struct SendgridClient {
    client: reqwest::Client,
    api_host: String,
    domain: String,
    api_key: SecretString,
}

impl SendgridClient {
    pub fn new(
        api_host: impl Into<String>,
        domain: impl Into<String>,
        api_key: SecretString,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME.into(),
                operation: "build_client".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_host: api_host.into(),
            domain: domain.into(),
            api_key,
        })
    }
}

#[async_trait]
impl SendgridApi for SendgridClient {
    async fn create_parse_setting(&self, url: &str) -> Result<ParseSetting, ProviderError> {
        let operation = "create_parse_setting";
        let setting = ParseSetting {
            hostname: self.domain.clone(),
            url: url.to_string(),
            spam_check: false,
            send_raw: false,
        };

        let resp = self
            .client
            .post(join_url(&self.api_host, PARSE_SETTINGS_PATH))
            .bearer_auth(self.api_key.expose_secret())
            .json(&setting)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME.into(),
                operation: operation.into(),
                reason: e.to_string(),
            })?;

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

        resp.json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER_NAME.into(),
                operation: operation.into(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_setting_wire_format() {
        let setting = ParseSetting {
            hostname: "in.burner.example".into(),
            url: "https://burner.example/sg/incoming/abc/".into(),
            spam_check: false,
            send_raw: false,
        };
        let json = serde_json::to_value(&setting).unwrap();
        assert_eq!(json["hostname"], "in.burner.example");
        assert_eq!(json["spam_check"], false);
        assert_eq!(json["send_raw"], false);
    }

    #[test]
    fn parse_setting_tolerates_missing_fields() {
        let setting: ParseSetting = serde_json::from_str(r#"{"hostname":"h"}"#).unwrap();
        assert_eq!(setting.hostname, "h");
        assert!(setting.url.is_empty());
    }
}
