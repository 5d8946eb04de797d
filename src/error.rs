//! Error types for burner-mail.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the inbox/message store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    Conflict { entity: String, id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by an email provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} has already been started")]
    AlreadyStarted { provider: String },

    #[error("Provider {provider} has not been started")]
    NotStarted { provider: String },

    #[error("{operation}: {provider} request failed: {reason}")]
    RequestFailed {
        provider: String,
        operation: String,
        reason: String,
    },

    #[error("{operation}: {provider} returned {status}: {body}")]
    Api {
        provider: String,
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation}: invalid response from {provider}: {reason}")]
    InvalidResponse {
        provider: String,
        operation: String,
        reason: String,
    },
}

/// HTML rewriting errors.
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] std::io::Error),

    #[error("Serialized document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Reasons an inbound webhook request is refused.
///
/// Each variant maps to a single HTTP status; see `providers::webhook`.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook request could not be verified: {0}")]
    Unverified(String),

    #[error("Sender {sender} is blacklisted")]
    Blacklisted { sender: String },

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Failed to resolve inbox {inbox_id}: {source}")]
    InboxResolution {
        inbox_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to process HTML body: {0}")]
    Content(#[from] SanitizeError),
}
