//! Configuration types.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file by `main`). `AppConfig::from_lookup` takes the lookup as a
//! closure so tests never have to touch the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_HF_API_BASE: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_HF_MODEL: &str = "sshleifer/distilbart-cnn-12-6";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gmail: GmailConfig,
    /// `None` when `SLACK_TOKEN` is unset.
    pub slack: Option<SlackConfig>,
    pub whatsapp: WhatsAppConfig,
    pub summarizer: SummarizerConfig,
}

/// HTTP server and outbound client settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Timeout applied to every outbound request.
    pub http_timeout: Duration,
    /// Directory for a daily-rolling log file, if file logging is wanted.
    pub log_dir: Option<PathBuf>,
}

/// What to do with an inbox message that has no `Subject` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSubjectPolicy {
    /// Abort the whole fetch with an error.
    #[default]
    Fail,
    /// Drop the message and log a warning.
    Skip,
    /// Keep the message with an empty subject.
    Empty,
}

impl FromStr for MissingSubjectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            "empty" => Ok(Self::Empty),
            other => Err(format!("expected fail, skip or empty, got '{other}'")),
        }
    }
}

/// Gmail source settings.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// OAuth authorized-user file (access + refresh token).
    pub token_path: PathBuf,
    /// Client secrets file, used when the token file lacks client id/secret.
    pub credentials_path: Option<PathBuf>,
    pub api_base: String,
    pub label: String,
    pub max_results: u32,
    pub missing_subject: MissingSubjectPolicy,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            credentials_path: None,
            api_base: DEFAULT_GMAIL_API_BASE.to_string(),
            label: "INBOX".to_string(),
            max_results: 10,
            missing_subject: MissingSubjectPolicy::default(),
        }
    }
}

/// Slack source settings.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub token: SecretString,
    pub channel_id: String,
    pub api_base: String,
    pub history_limit: u32,
}

/// WhatsApp placeholder settings. The key is accepted but not used yet.
#[derive(Debug, Clone, Default)]
pub struct WhatsAppConfig {
    pub api_key: Option<SecretString>,
}

/// Supported summarization backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizerBackend {
    HuggingFace,
    Anthropic,
    OpenAi,
}

impl FromStr for SummarizerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!(
                "expected huggingface, anthropic or openai, got '{other}'"
            )),
        }
    }
}

/// How a failed summary surfaces in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFailurePolicy {
    /// Keep the record; put a placeholder in `summary` and the reason in `summary_error`.
    #[default]
    Embed,
    /// Fail the whole fetch.
    Fail,
}

impl FromStr for SummaryFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embed" => Ok(Self::Embed),
            "fail" => Ok(Self::Fail),
            other => Err(format!("expected embed or fail, got '{other}'")),
        }
    }
}

/// Summarization model settings.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub backend: SummarizerBackend,
    pub model: String,
    /// Token for the chosen backend. Optional for Hugging Face.
    pub api_key: Option<SecretString>,
    pub api_base: String,
    pub min_length: u32,
    pub max_length: u32,
    pub failure_policy: SummaryFailurePolicy,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server = ServerConfig {
            bind: parse_or(&get, "INBOX_DIGEST_BIND", DEFAULT_BIND.parse().ok())?,
            http_timeout: Duration::from_secs(parse_or(
                &get,
                "INBOX_DIGEST_HTTP_TIMEOUT_SECS",
                Some(30u64),
            )?),
            log_dir: get("INBOX_DIGEST_LOG_DIR").map(PathBuf::from),
        };

        let gmail_defaults = GmailConfig::default();
        let gmail = GmailConfig {
            token_path: get("GMAIL_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(gmail_defaults.token_path),
            credentials_path: get("GMAIL_CREDENTIALS_PATH").map(PathBuf::from),
            api_base: get("GMAIL_API_BASE").unwrap_or(gmail_defaults.api_base),
            label: get("GMAIL_LABEL").unwrap_or(gmail_defaults.label),
            max_results: parse_or(&get, "GMAIL_MAX_RESULTS", Some(gmail_defaults.max_results))?,
            missing_subject: parse_or(
                &get,
                "GMAIL_MISSING_SUBJECT",
                Some(gmail_defaults.missing_subject),
            )?,
        };

        let slack = match get("SLACK_TOKEN") {
            Some(token) => {
                let channel_id =
                    get("SLACK_CHANNEL_ID").ok_or_else(|| ConfigError::MissingRequired {
                        key: "SLACK_CHANNEL_ID".to_string(),
                        hint: "Set it to the id of the channel to read (e.g. C0123456789)."
                            .to_string(),
                    })?;
                Some(SlackConfig {
                    token: SecretString::from(token),
                    channel_id,
                    api_base: get("SLACK_API_BASE")
                        .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string()),
                    history_limit: parse_or(&get, "SLACK_HISTORY_LIMIT", Some(10u32))?,
                })
            }
            None => None,
        };

        let whatsapp = WhatsAppConfig {
            api_key: get("WHATSAPP_API_KEY").map(SecretString::from),
        };

        let summarizer = summarizer_config(&get)?;

        Ok(Self {
            server,
            gmail,
            slack,
            whatsapp,
            summarizer,
        })
    }
}

fn summarizer_config<G>(get: &G) -> Result<SummarizerConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let backend: SummarizerBackend =
        parse_or(get, "SUMMARIZER_BACKEND", Some(SummarizerBackend::HuggingFace))?;

    let (default_model, api_key) = match backend {
        SummarizerBackend::HuggingFace => (DEFAULT_HF_MODEL, get("HF_API_TOKEN")),
        SummarizerBackend::Anthropic => (
            DEFAULT_ANTHROPIC_MODEL,
            Some(
                get("ANTHROPIC_API_KEY")
                    .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".into()))?,
            ),
        ),
        SummarizerBackend::OpenAi => (
            DEFAULT_OPENAI_MODEL,
            Some(
                get("OPENAI_API_KEY")
                    .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".into()))?,
            ),
        ),
    };

    let min_length: u32 = parse_or(get, "SUMMARY_MIN_LENGTH", Some(25))?;
    let max_length: u32 = parse_or(get, "SUMMARY_MAX_LENGTH", Some(50))?;
    if max_length == 0 || min_length > max_length {
        return Err(ConfigError::InvalidValue {
            key: "SUMMARY_MAX_LENGTH".to_string(),
            message: format!(
                "max length {max_length} must be positive and at least min length {min_length}"
            ),
        });
    }

    Ok(SummarizerConfig {
        backend,
        model: get("SUMMARIZER_MODEL").unwrap_or_else(|| default_model.to_string()),
        api_key: api_key.map(SecretString::from),
        api_base: get("HF_API_BASE").unwrap_or_else(|| DEFAULT_HF_API_BASE.to_string()),
        min_length,
        max_length,
        failure_policy: parse_or(get, "SUMMARY_FAILURE_POLICY", Some(SummaryFailurePolicy::Embed))?,
    })
}

/// Parse `key` if present, otherwise fall back to `default`.
///
/// A `None` default makes the key required.
fn parse_or<G, T>(get: &G, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string())),
    }
}
