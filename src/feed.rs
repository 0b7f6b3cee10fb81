//! Unified feed: all sources in one list, with keyword priority.
//!
//! Unlike the per-source endpoints, one failing source does not sink the
//! response: its error is reported next to the items the other sources
//! produced.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::SourceError;
use crate::llm::Summarizer;
use crate::sources::{Fetcher, GmailMessage, Platform, SlackMessage, WhatsAppMessage};

static URGENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(urgent|asap|emergency|important)").unwrap());

static FOLLOW_UP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(follow[\s-]?up|reminder|update)").unwrap());

/// Triage bucket shown next to each feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Urgent,
    FollowUp,
    Low,
}

impl Priority {
    /// Keyword classification; urgent wins over follow-up.
    pub fn classify(text: &str) -> Self {
        if URGENT.is_match(text) {
            Self::Urgent
        } else if FOLLOW_UP.is_match(text) {
            Self::FollowUp
        } else {
            Self::Low
        }
    }
}

/// A message from any source in a common shape.
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub platform: Platform,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub content: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<GmailMessage> for FeedItem {
    fn from(m: GmailMessage) -> Self {
        Self {
            platform: Platform::Gmail,
            sender: m.from.unwrap_or_default(),
            priority: Priority::classify(&m.subject),
            subject: Some(m.subject),
            content: m.snippet,
            summary: m.summary,
            summary_error: m.summary_error,
            timestamp: m.received_at,
        }
    }
}

impl From<SlackMessage> for FeedItem {
    fn from(m: SlackMessage) -> Self {
        Self {
            platform: Platform::Slack,
            sender: m.user.unwrap_or_default(),
            subject: None,
            priority: Priority::classify(&m.text),
            content: m.text,
            summary: m.summary,
            summary_error: m.summary_error,
            timestamp: m.sent_at,
        }
    }
}

impl From<WhatsAppMessage> for FeedItem {
    fn from(m: WhatsAppMessage) -> Self {
        Self {
            platform: Platform::WhatsApp,
            sender: m.sender,
            subject: None,
            priority: Priority::classify(&m.message),
            content: m.message,
            summary: m.summary,
            summary_error: None,
            timestamp: None,
        }
    }
}

/// A source that failed while building the feed.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub platform: Platform,
    pub message: String,
}

/// Items from every source that succeeded plus the failures of the rest.
#[derive(Debug, Default)]
pub struct Feed {
    pub items: Vec<FeedItem>,
    pub errors: Vec<SourceFailure>,
}

impl Feed {
    /// True when no source produced a result.
    pub fn all_failed(&self, sources: usize) -> bool {
        self.errors.len() >= sources
    }

    fn absorb(&mut self, platform: Platform, result: Result<Vec<FeedItem>, SourceError>) {
        match result {
            Ok(items) => self.items.extend(items),
            Err(e) => {
                warn!(platform = %platform, error = %e, "Source failed while building feed");
                self.errors.push(SourceFailure {
                    platform,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Newest first; undated items keep their source order after dated ones.
    fn sort(&mut self) {
        self.items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

async fn gather<F>(fetcher: &F, summarizer: &Summarizer) -> Result<Vec<FeedItem>, SourceError>
where
    F: Fetcher,
    F::Record: Into<FeedItem>,
{
    let records = fetcher.fetch(summarizer).await?;
    Ok(records.into_iter().map(Into::into).collect())
}

/// Fetch all three sources concurrently and merge them.
pub async fn collect<G, S, W>(gmail: &G, slack: &S, whatsapp: &W, summarizer: &Summarizer) -> Feed
where
    G: Fetcher,
    G::Record: Into<FeedItem>,
    S: Fetcher,
    S::Record: Into<FeedItem>,
    W: Fetcher,
    W::Record: Into<FeedItem>,
{
    let (gmail_items, slack_items, whatsapp_items) = tokio::join!(
        gather(gmail, summarizer),
        gather(slack, summarizer),
        gather(whatsapp, summarizer),
    );

    let mut feed = Feed::default();
    feed.absorb(gmail.platform(), gmail_items);
    feed.absorb(slack.platform(), slack_items);
    feed.absorb(whatsapp.platform(), whatsapp_items);
    feed.sort();
    feed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::config::SummaryFailurePolicy;
    use crate::error::LlmError;
    use crate::llm::{SummaryModel, SummaryParams};

    struct Silent;

    #[async_trait]
    impl SummaryModel for Silent {
        fn model_name(&self) -> &str {
            "silent"
        }

        async fn summarize(&self, _text: &str, _params: &SummaryParams) -> Result<String, LlmError> {
            Ok(String::new())
        }
    }

    /// A source whose upstream is always unreachable.
    struct Down(Platform);

    #[async_trait]
    impl Fetcher for Down {
        type Record = WhatsAppMessage;

        fn platform(&self) -> Platform {
            self.0
        }

        async fn fetch(&self, _summarizer: &Summarizer) -> Result<Vec<WhatsAppMessage>, SourceError> {
            Err(SourceError::Unavailable {
                name: self.0.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    #[test]
    fn urgent_keywords() {
        assert_eq!(Priority::classify("URGENT: server down"), Priority::Urgent);
        assert_eq!(Priority::classify("Please reply asap"), Priority::Urgent);
        assert_eq!(Priority::classify("Important notice"), Priority::Urgent);
    }

    #[test]
    fn follow_up_keywords() {
        assert_eq!(Priority::classify("Follow up on invoice"), Priority::FollowUp);
        assert_eq!(Priority::classify("followup"), Priority::FollowUp);
        assert_eq!(Priority::classify("Weekly updates"), Priority::FollowUp);
        assert_eq!(Priority::classify("Reminder: dentist"), Priority::FollowUp);
    }

    #[test]
    fn urgent_beats_follow_up() {
        assert_eq!(
            Priority::classify("Urgent reminder about the update"),
            Priority::Urgent
        );
    }

    #[test]
    fn keywords_must_start_a_word() {
        assert_eq!(Priority::classify("Unimportant chatter"), Priority::Low);
        assert_eq!(Priority::classify("What are your business hours?"), Priority::Low);
    }

    #[test]
    fn priority_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(Priority::FollowUp).unwrap(),
            serde_json::json!("follow-up")
        );
    }

    #[test]
    fn gmail_priority_uses_subject() {
        let item = FeedItem::from(GmailMessage {
            subject: "ASAP: contract".into(),
            snippet: "nothing special".into(),
            summary: "s".into(),
            summary_error: None,
            id: "1".into(),
            from: Some("bob@example.com".into()),
            received_at: None,
        });
        assert_eq!(item.priority, Priority::Urgent);
        assert_eq!(item.sender, "bob@example.com");
        assert_eq!(item.subject.as_deref(), Some("ASAP: contract"));
    }

    #[test]
    fn failed_summary_keeps_its_error() {
        let item = FeedItem::from(SlackMessage {
            text: String::new(),
            summary: "Error summarizing text: input text is empty".into(),
            summary_error: Some("input text is empty".into()),
            user: Some("U2".into()),
            sent_at: None,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["summary_error"], "input text is empty");

        let ok = FeedItem::from(SlackMessage {
            text: "Deploy finished".into(),
            summary: "Deploy done.".into(),
            summary_error: None,
            user: None,
            sent_at: None,
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("summary_error").is_none());
    }

    #[tokio::test]
    async fn collect_reports_every_failed_source() {
        let summarizer = Summarizer::new(
            Arc::new(Silent),
            SummaryParams::default(),
            SummaryFailurePolicy::Embed,
        );
        let feed = collect(
            &Down(Platform::Gmail),
            &Down(Platform::Slack),
            &Down(Platform::WhatsApp),
            &summarizer,
        )
        .await;
        assert!(feed.items.is_empty());
        assert!(feed.all_failed(3));
        let platforms: Vec<_> = feed.errors.iter().map(|e| e.platform).collect();
        assert_eq!(
            platforms,
            [Platform::Gmail, Platform::Slack, Platform::WhatsApp]
        );
    }

    #[test]
    fn sort_puts_newest_first_and_undated_last() {
        let at = |secs| DateTime::from_timestamp(secs, 0);
        let item = |content: &str, timestamp| FeedItem {
            platform: Platform::Slack,
            sender: String::new(),
            subject: None,
            content: content.to_string(),
            summary: String::new(),
            summary_error: None,
            priority: Priority::Low,
            timestamp,
        };
        let mut feed = Feed {
            items: vec![
                item("undated-1", None),
                item("old", at(100)),
                item("undated-2", None),
                item("new", at(200)),
            ],
            errors: vec![],
        };
        feed.sort();
        let order: Vec<_> = feed.items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(order, ["new", "old", "undated-1", "undated-2"]);
    }
}
