//! inbox-digest: Gmail, Slack and WhatsApp messages with short summaries,
//! served over a small read-only HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod llm;
pub mod sources;
