//! Summarization layer for inbox-digest.
//!
//! Supports:
//! - **Hugging Face**: hosted inference of a pretrained summarization model
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! `create_model` is called once at startup; the resulting handle is wrapped
//! in a `Summarizer` and shared by every fetcher.

mod huggingface;
pub mod provider;
mod rig_adapter;
pub mod summarizer;

pub use huggingface::HuggingFaceSummarizer;
pub use provider::{SummaryModel, SummaryParams};
pub use rig_adapter::RigAdapter;
pub use summarizer::{FAILED_SUMMARY_PREFIX, Summarization, Summarizer, SummaryField};

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::{SummarizerBackend, SummarizerConfig};
use crate::error::LlmError;

/// Create a summarization model from configuration.
pub fn create_model(
    config: &SummarizerConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn SummaryModel>, LlmError> {
    match config.backend {
        SummarizerBackend::HuggingFace => {
            tracing::info!("Using Hugging Face inference (model: {})", config.model);
            Ok(Arc::new(HuggingFaceSummarizer::new(
                client,
                config.api_base.clone(),
                config.model.clone(),
                config.api_key.clone(),
            )))
        }
        SummarizerBackend::Anthropic => create_anthropic_model(config),
        SummarizerBackend::OpenAi => create_openai_model(config),
    }
}

/// Build the shared `Summarizer` from configuration.
pub fn create_summarizer(
    config: &SummarizerConfig,
    client: reqwest::Client,
) -> Result<Summarizer, LlmError> {
    let model = create_model(config, client)?;
    Ok(Summarizer::new(
        model,
        SummaryParams {
            min_length: config.min_length,
            max_length: config.max_length,
        },
        config.failure_policy,
    ))
}

fn api_key<'a>(config: &'a SummarizerConfig, provider: &str) -> Result<&'a str, LlmError> {
    config
        .api_key
        .as_ref()
        .map(|k| k.expose_secret())
        .ok_or_else(|| LlmError::AuthFailed {
            provider: provider.to_string(),
        })
}

fn create_anthropic_model(config: &SummarizerConfig) -> Result<Arc<dyn SummaryModel>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(api_key(config, "anthropic")?).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}

fn create_openai_model(config: &SummarizerConfig) -> Result<Arc<dyn SummaryModel>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(api_key(config, "openai")?).map_err(|e| LlmError::RequestFailed {
            provider: "openai".to_string(),
            reason: format!("Failed to create OpenAI client: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}
