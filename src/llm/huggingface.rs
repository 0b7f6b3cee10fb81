//! Hugging Face hosted inference backend.
//!
//! Talks to the `summarization` task of the inference API. The default
//! model is the one the `transformers` summarization pipeline loads.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;

use super::provider::{SummaryModel, SummaryParams};

const PROVIDER: &str = "huggingface";

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    min_length: u32,
    max_length: u32,
    do_sample: bool,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct SummaryOutput {
    summary_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorOutput {
    error: String,
}

/// Summarization over the Hugging Face inference API.
pub struct HuggingFaceSummarizer {
    client: reqwest::Client,
    api_base: String,
    model: String,
    token: Option<SecretString>,
}

impl HuggingFaceSummarizer {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        model: impl Into<String>,
        token: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
            token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.api_base.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl SummaryModel for HuggingFaceSummarizer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, LlmError> {
        let body = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                min_length: params.min_length,
                max_length: params.max_length,
                do_sample: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        debug!(model = %self.model, chars = text.len(), "Requesting summary");
        let resp = request.send().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            let reason = serde_json::from_slice::<ErrorOutput>(&bytes)
                .map(|e| e.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed {
                    provider: PROVIDER.to_string(),
                },
                404 => LlmError::ModelNotAvailable {
                    provider: PROVIDER.to_string(),
                    model: self.model.clone(),
                },
                429 => LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after: None,
                },
                _ => LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: format!("HTTP {}: {}", status.as_u16(), reason),
                },
            });
        }

        parse_summary(&bytes)
    }
}

/// Extract the first `summary_text` from an inference response body.
fn parse_summary(body: &[u8]) -> Result<String, LlmError> {
    if let Ok(err) = serde_json::from_slice::<ErrorOutput>(body) {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: err.error,
        });
    }

    let outputs: Vec<SummaryOutput> = serde_json::from_slice(body)?;
    outputs
        .into_iter()
        .next()
        .map(|o| o.summary_text)
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "empty output list".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_summary() {
        let body = br#"[{"summary_text": "Order delayed until Friday."}, {"summary_text": "x"}]"#;
        assert_eq!(parse_summary(body).unwrap(), "Order delayed until Friday.");
    }

    #[test]
    fn error_body_is_invalid_response() {
        let body = br#"{"error": "Input is too long for this model"}"#;
        let err = parse_summary(body).unwrap_err();
        assert!(err.to_string().contains("Input is too long"));
    }

    #[test]
    fn empty_list_is_invalid_response() {
        assert!(matches!(
            parse_summary(b"[]"),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn garbage_is_json_error() {
        assert!(matches!(parse_summary(b"<html>"), Err(LlmError::Json(_))));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let hf = HuggingFaceSummarizer::new(
            reqwest::Client::new(),
            "http://localhost:9000/",
            "sshleifer/distilbart-cnn-12-6",
            None,
        );
        assert_eq!(
            hf.endpoint(),
            "http://localhost:9000/models/sshleifer/distilbart-cnn-12-6"
        );
    }

    #[test]
    fn request_disables_sampling() {
        let body = InferenceRequest {
            inputs: "hello",
            parameters: InferenceParameters {
                min_length: 25,
                max_length: 50,
                do_sample: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["parameters"]["do_sample"], false);
        assert_eq!(json["parameters"]["max_length"], 50);
        assert_eq!(json["options"]["wait_for_model"], true);
    }
}
