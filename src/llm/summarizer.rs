//! Summarizer adapter: turns model calls into a `Summarization` outcome.
//!
//! Fetchers never see `LlmError`. A failed summary is a value, and the
//! configured `SummaryFailurePolicy` decides whether it ends up embedded in
//! the record or fails the fetch.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SummaryFailurePolicy;
use crate::error::SourceError;

use super::provider::{SummaryModel, SummaryParams};

/// Prefix used for placeholder summaries when a failure is embedded.
pub const FAILED_SUMMARY_PREFIX: &str = "Error summarizing text: ";

const EMPTY_INPUT_REASON: &str = "input text is empty";

/// Outcome of summarizing one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summarization {
    Summary(String),
    /// Nothing to summarize; the model was not called.
    Empty,
    Failed { reason: String },
}

/// The summary to put on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryField {
    pub text: String,
    /// Set when `text` is a placeholder for a failed summary.
    pub error: Option<String>,
}

/// Shared summarizer handed to every fetcher.
pub struct Summarizer {
    model: Arc<dyn SummaryModel>,
    params: SummaryParams,
    policy: SummaryFailurePolicy,
}

impl Summarizer {
    pub fn new(
        model: Arc<dyn SummaryModel>,
        params: SummaryParams,
        policy: SummaryFailurePolicy,
    ) -> Self {
        Self {
            model,
            params,
            policy,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn params(&self) -> SummaryParams {
        self.params
    }

    /// Summarize `text`. Never fails; errors come back as `Summarization::Failed`.
    pub async fn summarize(&self, text: &str) -> Summarization {
        if text.trim().is_empty() {
            debug!("Skipping model call for empty input");
            return Summarization::Empty;
        }

        match self.model.summarize(text, &self.params).await {
            Ok(summary) if summary.trim().is_empty() => Summarization::Failed {
                reason: format!("model {} returned an empty summary", self.model_name()),
            },
            Ok(summary) => Summarization::Summary(summary.trim().to_string()),
            Err(e) => {
                warn!(model = self.model_name(), error = %e, "Summarization failed");
                Summarization::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Summarize `text` and apply the failure policy.
    ///
    /// Empty input always gets an embedded placeholder, whatever the policy.
    pub async fn summary_field(&self, text: &str) -> Result<SummaryField, SourceError> {
        match self.summarize(text).await {
            Summarization::Summary(text) => Ok(SummaryField { text, error: None }),
            Summarization::Empty => Ok(placeholder(EMPTY_INPUT_REASON.to_string())),
            Summarization::Failed { reason } => match self.policy {
                SummaryFailurePolicy::Embed => Ok(placeholder(reason)),
                SummaryFailurePolicy::Fail => Err(SourceError::Summarization { reason }),
            },
        }
    }
}

fn placeholder(reason: String) -> SummaryField {
    SummaryField {
        text: format!("{FAILED_SUMMARY_PREFIX}{reason}"),
        error: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;

    /// Echoes the first words of the input, counting calls.
    struct FirstWords {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SummaryModel for FirstWords {
        fn model_name(&self) -> &str {
            "first-words"
        }

        async fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text
                .split_whitespace()
                .take(params.max_length as usize)
                .collect::<Vec<_>>()
                .join(" "))
        }
    }

    struct Broken;

    #[async_trait]
    impl SummaryModel for Broken {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn summarize(&self, _text: &str, _params: &SummaryParams) -> Result<String, LlmError> {
            Err(LlmError::InvalidResponse {
                provider: "broken".into(),
                reason: "index out of range".into(),
            })
        }
    }

    fn first_words() -> Arc<FirstWords> {
        Arc::new(FirstWords {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn returns_model_summary() {
        let summarizer = Summarizer::new(
            first_words(),
            SummaryParams {
                min_length: 1,
                max_length: 3,
            },
            SummaryFailurePolicy::Embed,
        );
        let result = summarizer.summarize("the quick brown fox jumps").await;
        assert_eq!(result, Summarization::Summary("the quick brown".into()));
    }

    #[tokio::test]
    async fn empty_input_skips_the_model() {
        let model = first_words();
        let summarizer = Summarizer::new(
            model.clone(),
            SummaryParams::default(),
            SummaryFailurePolicy::Embed,
        );
        let result = summarizer.summarize("   ").await;
        assert_eq!(result, Summarization::Empty);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embed_policy_produces_placeholder_text() {
        let summarizer = Summarizer::new(
            Arc::new(Broken),
            SummaryParams::default(),
            SummaryFailurePolicy::Embed,
        );
        let field = summarizer.summary_field("hello there").await.unwrap();
        assert!(field.text.starts_with(FAILED_SUMMARY_PREFIX));
        assert!(field.text.contains("index out of range"));
        assert_eq!(
            field.error.as_deref(),
            Some("Invalid response from broken: index out of range")
        );
    }

    #[tokio::test]
    async fn embed_policy_on_empty_input_is_non_empty() {
        let summarizer = Summarizer::new(
            first_words(),
            SummaryParams::default(),
            SummaryFailurePolicy::Embed,
        );
        let field = summarizer.summary_field("").await.unwrap();
        assert_eq!(field.text, "Error summarizing text: input text is empty");
    }

    #[tokio::test]
    async fn fail_policy_still_embeds_placeholder_for_empty_input() {
        let model = first_words();
        let summarizer = Summarizer::new(
            model.clone(),
            SummaryParams::default(),
            SummaryFailurePolicy::Fail,
        );
        let field = summarizer.summary_field("").await.unwrap();
        assert_eq!(field.text, "Error summarizing text: input text is empty");
        assert_eq!(field.error.as_deref(), Some("input text is empty"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fail_policy_returns_error() {
        let summarizer = Summarizer::new(
            Arc::new(Broken),
            SummaryParams::default(),
            SummaryFailurePolicy::Fail,
        );
        let err = summarizer.summary_field("hello").await.unwrap_err();
        assert!(matches!(err, SourceError::Summarization { .. }));
    }

    #[tokio::test]
    async fn repeated_calls_are_deterministic() {
        let summarizer = Summarizer::new(
            first_words(),
            SummaryParams::default(),
            SummaryFailurePolicy::Embed,
        );
        let a = summarizer.summarize("Meeting moved to Thursday at 3pm").await;
        let b = summarizer.summarize("Meeting moved to Thursday at 3pm").await;
        assert_eq!(a, b);
    }
}
