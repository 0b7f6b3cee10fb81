//! Summarization model abstraction.

use async_trait::async_trait;

use crate::error::LlmError;

/// Output bounds for a summary, in model tokens.
///
/// Decoding is always greedy; there is no sampling knob on purpose so that
/// the same input yields the same summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryParams {
    pub min_length: u32,
    pub max_length: u32,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            min_length: 25,
            max_length: 50,
        }
    }
}

/// A text-to-text summarization model.
///
/// Implementations are created once at startup and shared across requests,
/// so they must be safe to call concurrently.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Condense `text` within `params`.
    async fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, LlmError>;
}
