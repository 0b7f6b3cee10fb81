//! WhatsApp source: placeholder until a provider integration exists.
//!
//! Returns the same two sample conversations on every call. There is no
//! network access and no summarizer call; the sample summaries are fixed.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::WhatsAppConfig;
use crate::error::SourceError;
use crate::llm::Summarizer;

use super::{Fetcher, Platform};

/// One WhatsApp message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhatsAppMessage {
    pub sender: String,
    pub message: String,
    pub summary: String,
}

const SAMPLE_MESSAGES: [(&str, &str, &str); 2] = [
    (
        "+1234567890",
        "Hi, I need help with my order.",
        "Customer asking about order assistance.",
    ),
    (
        "+0987654321",
        "What are your business hours?",
        "Customer inquiring about business hours.",
    ),
];

/// Stub fetcher returning fixed sample data.
pub struct WhatsAppFetcher {
    config: WhatsAppConfig,
}

impl WhatsAppFetcher {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self { config }
    }

    pub fn sample_messages() -> Vec<WhatsAppMessage> {
        SAMPLE_MESSAGES
            .iter()
            .map(|(sender, message, summary)| WhatsAppMessage {
                sender: sender.to_string(),
                message: message.to_string(),
                summary: summary.to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl Fetcher for WhatsAppFetcher {
    type Record = WhatsAppMessage;

    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    async fn fetch(&self, _summarizer: &Summarizer) -> Result<Vec<WhatsAppMessage>, SourceError> {
        debug!(
            api_key_set = self.config.api_key.is_some(),
            "Serving sample WhatsApp messages"
        );
        Ok(Self::sample_messages())
    }
}
