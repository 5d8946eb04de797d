//! Configuration types, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Host server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Public base URL of this deployment, used to build webhook URLs.
    pub website_addr: String,
    pub port: u16,
    /// How often expired provider routes are swept.
    pub sweep_interval: Duration,
    /// Blacklist entries (`user@domain`, `@domain` or `domain`).
    pub blacklisted: Vec<String>,
    pub provider: ProviderConfig,
}

/// Which email provider to run, with its credentials.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Mailgun(MailgunConfig),
    Sendgrid(SendgridConfig),
}

#[derive(Debug, Clone)]
pub struct MailgunConfig {
    pub api_key: SecretString,
    /// Key used to verify webhook signatures. Falls back to the API key.
    pub signing_key: SecretString,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SendgridConfig {
    pub domain: String,
    pub api_key: SecretString,
    pub api_host: String,
}

impl ServerConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let website_addr = required(&lookup, "BURNER_WEBSITE_ADDR")?
            .trim_end_matches('/')
            .to_string();

        let port = parsed(&lookup, "BURNER_PORT")?.unwrap_or(DEFAULT_PORT);
        let sweep_interval_secs: u64 =
            parsed(&lookup, "BURNER_SWEEP_INTERVAL_SECS")?.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        if sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BURNER_SWEEP_INTERVAL_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let blacklisted: Vec<String> = lookup("BURNER_BLACKLISTED")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let provider = ProviderConfig::from_lookup(&lookup)?;

        Ok(Self {
            website_addr,
            port,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            blacklisted,
            provider,
        })
    }
}

impl ProviderConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = required(lookup, "BURNER_EMAIL_PROVIDER")?;
        match name.to_ascii_lowercase().as_str() {
            "mailgun" => {
                let api_key = required(lookup, "MAILGUN_API_KEY")?;
                let signing_key = lookup("MAILGUN_SIGNING_KEY").unwrap_or_else(|| api_key.clone());
                let api_base = lookup("MAILGUN_API_BASE")
                    .unwrap_or_else(|| crate::providers::mailgun::DEFAULT_API_BASE.to_string());
                Ok(Self::Mailgun(MailgunConfig {
                    api_key: SecretString::from(api_key),
                    signing_key: SecretString::from(signing_key),
                    api_base: api_base.trim_end_matches('/').to_string(),
                }))
            }
            "sendgrid" => {
                let domain = required(lookup, "SENDGRID_DOMAIN")?;
                let api_key = required(lookup, "SENDGRID_API_KEY")?;
                let api_host = lookup("SENDGRID_API_HOST")
                    .unwrap_or_else(|| crate::providers::sendgrid::DEFAULT_API_HOST.to_string());
                Ok(Self::Sendgrid(SendgridConfig {
                    domain,
                    api_key: SecretString::from(api_key),
                    api_host: api_host.trim_end_matches('/').to_string(),
                }))
            }
            other => Err(ConfigError::InvalidValue {
                key: "BURNER_EMAIL_PROVIDER".into(),
                message: format!("unknown provider '{other}', expected mailgun or sendgrid"),
            }),
        }
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}
