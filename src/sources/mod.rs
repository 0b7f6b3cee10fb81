//! Message sources: one fetcher per upstream.

pub mod gmail;
pub mod google_auth;
pub mod slack;
pub mod whatsapp;

pub use gmail::{GmailFetcher, GmailMessage};
pub use slack::{SlackFetcher, SlackMessage};
pub use whatsapp::{WhatsAppFetcher, WhatsAppMessage};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SourceError;
use crate::llm::Summarizer;

/// The three supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Gmail,
    Slack,
    WhatsApp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Slack => "slack",
            Self::WhatsApp => "whatsapp",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieves recent messages from one source and summarizes each of them.
///
/// Messages are processed one after another; a fetch-level failure aborts
/// the whole call.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Record: Serialize + Send;

    fn platform(&self) -> Platform;

    async fn fetch(&self, summarizer: &Summarizer) -> Result<Vec<Self::Record>, SourceError>;
}
