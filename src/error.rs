//! Error types for inbox-digest.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while fetching from a message source.
///
/// Each variant maps to a distinct HTTP status at the API layer.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{name} is not configured: {reason}")]
    NotConfigured { name: String, reason: String },

    #[error("Authentication failed for {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("{name} is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("{name} API error: {reason}")]
    Api { name: String, reason: String },

    #[error("Malformed response from {name}: {reason}")]
    MalformedResponse { name: String, reason: String },

    #[error("Message {message_id} has no {header} header")]
    MissingHeader { header: String, message_id: String },

    #[error("Summarization failed: {reason}")]
    Summarization { reason: String },
}

impl SourceError {
    /// Classify a transport-level reqwest failure.
    ///
    /// Timeouts and connection errors mean the upstream could not be
    /// reached; body decode errors mean it answered with something we
    /// don't understand.
    pub fn from_reqwest(name: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse {
                name: name.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Unavailable {
                name: name.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Classify a non-success HTTP status returned by an upstream API.
    pub fn from_status(name: &str, status: reqwest::StatusCode, reason: String) -> Self {
        let name = name.to_string();
        match status.as_u16() {
            401 | 403 => Self::AuthFailed { name, reason },
            429 | 500..=599 => Self::Unavailable { name, reason },
            _ => Self::Api {
                name,
                reason: format!("HTTP {}: {}", status.as_u16(), reason),
            },
        }
    }
}

/// Summarization model errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Model {model} not available on provider {provider}")]
    ModelNotAvailable { provider: String, model: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
