//! Slack source: reads recent channel history via `conversations.history`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SlackConfig;
use crate::error::SourceError;
use crate::llm::Summarizer;

use super::{Fetcher, Platform};

const NAME: &str = "slack";

/// Slack error codes that mean the token is unusable.
const AUTH_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "no_permission",
    "missing_scope",
];

/// One summarized channel message.
#[derive(Debug, Clone, Serialize)]
pub struct SlackMessage {
    pub text: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
    /// Slack user id of the author (bots have none).
    #[serde(skip)]
    pub user: Option<String>,
    #[serde(skip)]
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Parse a Slack `ts` ("1512085950.000216") into a UTC timestamp.
fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{frac:0<6}").get(..6)?.parse().ok()?;
    DateTime::from_timestamp(secs, micros * 1_000)
}

/// Map a Slack `ok: false` error code to a `SourceError`.
fn classify_error(code: &str) -> SourceError {
    let reason = code.to_string();
    if AUTH_ERRORS.contains(&code) {
        SourceError::AuthFailed {
            name: NAME.to_string(),
            reason,
        }
    } else if code == "ratelimited" || code == "service_unavailable" {
        SourceError::Unavailable {
            name: NAME.to_string(),
            reason,
        }
    } else {
        SourceError::Api {
            name: NAME.to_string(),
            reason,
        }
    }
}

/// Slack fetcher using a bot/user bearer token.
pub struct SlackFetcher {
    /// `None` when Slack is not configured; every fetch then fails.
    config: Option<SlackConfig>,
    client: reqwest::Client,
}

impl SlackFetcher {
    pub fn new(config: Option<SlackConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn history(&self, config: &SlackConfig) -> Result<Vec<HistoryMessage>, SourceError> {
        let url = format!(
            "{}/conversations.history",
            config.api_base.trim_end_matches('/')
        );
        let limit = config.history_limit.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("channel", config.channel_id.as_str()), ("limit", limit.as_str())])
            .bearer_auth(config.token.expose_secret())
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(NAME, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::from_status(NAME, status, body));
        }

        let history: HistoryResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::from_reqwest(NAME, e))?;

        if !history.ok {
            let code = history.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(classify_error(&code));
        }

        Ok(history.messages)
    }
}

#[async_trait]
impl Fetcher for SlackFetcher {
    type Record = SlackMessage;

    fn platform(&self) -> Platform {
        Platform::Slack
    }

    async fn fetch(&self, summarizer: &Summarizer) -> Result<Vec<SlackMessage>, SourceError> {
        let Some(config) = &self.config else {
            return Err(SourceError::NotConfigured {
                name: NAME.to_string(),
                reason: "SLACK_TOKEN is not set".to_string(),
            });
        };

        let messages = self.history(config).await?;
        debug!(count = messages.len(), channel = %config.channel_id, "Fetched Slack history");

        let mut records = Vec::with_capacity(messages.len());
        for message in messages {
            let text = message.text.unwrap_or_default();
            let summary = summarizer.summary_field(&text).await?;
            records.push(SlackMessage {
                text,
                summary: summary.text,
                summary_error: summary.error,
                user: message.user.or(message.bot_id),
                sent_at: message.ts.as_deref().and_then(parse_ts),
            });
        }

        info!(count = records.len(), "Fetched Slack messages");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slack_ts() {
        let dt = parse_ts("1512085950.000216").unwrap();
        assert_eq!(dt.timestamp(), 1512085950);
        assert_eq!(dt.timestamp_subsec_micros(), 216);
        assert!(parse_ts("1512085950").is_some());
        assert!(parse_ts("yesterday").is_none());
    }

    #[test]
    fn auth_codes_are_auth_failures() {
        assert!(matches!(
            classify_error("invalid_auth"),
            SourceError::AuthFailed { .. }
        ));
        assert!(matches!(
            classify_error("token_revoked"),
            SourceError::AuthFailed { .. }
        ));
    }

    #[test]
    fn ratelimited_is_unavailable() {
        assert!(matches!(
            classify_error("ratelimited"),
            SourceError::Unavailable { .. }
        ));
    }

    #[test]
    fn channel_errors_are_api_errors() {
        let err = classify_error("channel_not_found");
        assert_eq!(err.to_string(), "slack API error: channel_not_found");
    }

    #[test]
    fn history_message_without_text() {
        let history: HistoryResponse = serde_json::from_str(
            r#"{"ok": true, "messages": [{"type": "message", "subtype": "channel_join", "ts": "1.0"}]}"#,
        )
        .unwrap();
        assert!(history.ok);
        assert!(history.messages[0].text.is_none());
    }

    #[tokio::test]
    async fn unconfigured_fetch_fails() {
        use std::sync::Arc;

        use async_trait::async_trait;

        use crate::config::SummaryFailurePolicy;
        use crate::error::LlmError;
        use crate::llm::{SummaryModel, SummaryParams};

        struct Unused;

        #[async_trait]
        impl SummaryModel for Unused {
            fn model_name(&self) -> &str {
                "unused"
            }
            async fn summarize(&self, _: &str, _: &SummaryParams) -> Result<String, LlmError> {
                unreachable!("no messages are fetched")
            }
        }

        let summarizer = Summarizer::new(
            Arc::new(Unused),
            SummaryParams::default(),
            SummaryFailurePolicy::Embed,
        );
        let fetcher = SlackFetcher::new(None, reqwest::Client::new());
        assert!(!fetcher.is_configured());
        let err = fetcher.fetch(&summarizer).await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured { .. }));
    }
}
