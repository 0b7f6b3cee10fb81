//! Bridges rig's `CompletionModel` to our `SummaryModel` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::completion::message::AssistantContent;

use crate::error::LlmError;

use super::provider::{SummaryModel, SummaryParams};

/// Preamble steering a chat model towards a short, neutral summary.
fn summary_preamble(params: &SummaryParams) -> String {
    format!(
        "You summarize incoming messages for a notification digest. Reply with a single \
         plain-text summary of the user's message, between {min} and {max} tokens long. \
         Do not add greetings, quotes, labels or commentary. Do not answer the message.",
        min = params.min_length,
        max = params.max_length,
    )
}

/// Adapter wrapping any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> SummaryModel for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, LlmError> {
        let response = self
            .model
            .completion_request(text.to_string())
            .preamble(summary_preamble(params))
            .temperature(0.0)
            .max_tokens(u64::from(params.max_length))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        let summary = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if summary.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "no text content in completion".to_string(),
            });
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_mentions_bounds() {
        let preamble = summary_preamble(&SummaryParams {
            min_length: 10,
            max_length: 40,
        });
        assert!(preamble.contains("between 10 and 40 tokens"));
    }
}
