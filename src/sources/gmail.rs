//! Gmail source: lists recent inbox messages and summarizes their snippets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{GmailConfig, MissingSubjectPolicy};
use crate::error::SourceError;
use crate::llm::Summarizer;

use super::google_auth::GoogleCredentials;
use super::{Fetcher, Platform};

const NAME: &str = "gmail";

/// One summarized inbox message.
#[derive(Debug, Clone, Serialize)]
pub struct GmailMessage {
    pub subject: String,
    pub snippet: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
    /// Gmail message id.
    #[serde(skip)]
    pub id: String,
    /// Raw `From` header.
    #[serde(skip)]
    pub from: Option<String>,
    #[serde(skip)]
    pub received_at: Option<DateTime<Utc>>,
}

// ── Gmail API wire types ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    /// Absent when the label is empty.
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResource {
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorReason>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorReason {
    #[serde(default)]
    reason: String,
}

/// Gmail reports quota exhaustion as 403 with one of these reasons.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Map a failed Gmail response to a `SourceError`.
fn classify_error(status: reqwest::StatusCode, body: String) -> SourceError {
    let Ok(parsed) = serde_json::from_str::<GoogleErrorBody>(&body) else {
        return SourceError::from_status(NAME, status, body);
    };
    let rate_limited = parsed
        .error
        .errors
        .iter()
        .any(|e| RATE_LIMIT_REASONS.contains(&e.reason.as_str()));
    if status == reqwest::StatusCode::FORBIDDEN && rate_limited {
        return SourceError::Unavailable {
            name: NAME.to_string(),
            reason: parsed.error.message,
        };
    }
    SourceError::from_status(NAME, status, parsed.error.message)
}

impl MessageResource {
    /// Exact, case-sensitive header lookup.
    fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    fn received_at(&self) -> Option<DateTime<Utc>> {
        let millis: i64 = self.internal_date.as_deref()?.parse().ok()?;
        DateTime::from_timestamp_millis(millis)
    }
}

// ── Fetcher ─────────────────────────────────────────────────────────

/// Gmail fetcher using the REST API with an OAuth token file.
pub struct GmailFetcher {
    config: GmailConfig,
    client: reqwest::Client,
}

impl GmailFetcher {
    pub fn new(config: GmailConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/me/{path}",
            self.config.api_base.trim_end_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        token: &SecretString,
    ) -> Result<T, SourceError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(NAME, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, body));
        }

        resp.json()
            .await
            .map_err(|e| SourceError::from_reqwest(NAME, e))
    }

    async fn list_message_ids(&self, token: &SecretString) -> Result<Vec<String>, SourceError> {
        let max_results = self.config.max_results.to_string();
        let list: ListResponse = self
            .get_json(
                &self.api_url("messages"),
                &[
                    ("labelIds", self.config.label.as_str()),
                    ("maxResults", max_results.as_str()),
                ],
                token,
            )
            .await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str, token: &SecretString) -> Result<MessageResource, SourceError> {
        self.get_json(
            &self.api_url(&format!("messages/{id}")),
            &[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Date"),
            ],
            token,
        )
        .await
    }
}

#[async_trait]
impl Fetcher for GmailFetcher {
    type Record = GmailMessage;

    fn platform(&self) -> Platform {
        Platform::Gmail
    }

    async fn fetch(&self, summarizer: &Summarizer) -> Result<Vec<GmailMessage>, SourceError> {
        let credentials = GoogleCredentials::load(
            &self.config.token_path,
            self.config.credentials_path.as_deref(),
        )
        .await?;
        let access = credentials.access_token(&self.client).await?;

        let ids = self.list_message_ids(&access.token).await?;
        debug!(count = ids.len(), label = %self.config.label, "Listed Gmail messages");

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let message = self.get_message(&id, &access.token).await?;

            let subject = match (message.header("Subject"), self.config.missing_subject) {
                (Some(subject), _) => subject.to_string(),
                (None, MissingSubjectPolicy::Fail) => {
                    return Err(SourceError::MissingHeader {
                        header: "Subject".to_string(),
                        message_id: message.id.clone(),
                    });
                }
                (None, MissingSubjectPolicy::Skip) => {
                    warn!(message_id = %message.id, "Skipping Gmail message without Subject header");
                    continue;
                }
                (None, MissingSubjectPolicy::Empty) => String::new(),
            };

            let summary = summarizer.summary_field(&message.snippet).await?;
            records.push(GmailMessage {
                from: message.header("From").map(String::from),
                received_at: message.received_at(),
                subject,
                snippet: message.snippet,
                summary: summary.text,
                summary_error: summary.error,
                id: message.id,
            });
        }

        info!(count = records.len(), "Fetched Gmail messages");
        Ok(records)
    }
}
