//! HTTP facade: one read-only endpoint per source plus the unified feed.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn};
use uuid::Uuid;

use crate::error::SourceError;
use crate::feed::{self, FeedItem, SourceFailure};
use crate::llm::Summarizer;
use crate::sources::{Fetcher, GmailFetcher, Platform, SlackFetcher, WhatsAppFetcher};

/// Number of sources merged into the unified feed.
const FEED_SOURCES: usize = 3;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<Summarizer>,
    pub gmail: Arc<GmailFetcher>,
    pub slack: Arc<SlackFetcher>,
    pub whatsapp: Arc<WhatsAppFetcher>,
}

/// `{"status": "success", "data": ...}` or `{"status": "error", "message": ...}`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success { data: T },
    Error { message: String },
}

#[derive(Debug, Serialize)]
struct FeedEnvelope {
    status: &'static str,
    data: Vec<FeedItem>,
    errors: Vec<SourceFailure>,
}

/// HTTP status for each fetch failure.
pub fn status_for(err: &SourceError) -> StatusCode {
    match err {
        SourceError::AuthFailed { .. } => StatusCode::UNAUTHORIZED,
        SourceError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SourceError::Api { .. } => StatusCode::BAD_GATEWAY,
        SourceError::NotConfigured { .. }
        | SourceError::MalformedResponse { .. }
        | SourceError::MissingHeader { .. }
        | SourceError::Summarization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the Axum router with all endpoints.
pub fn routes(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health))
        .route("/api/gmail", get(gmail_messages))
        .route("/api/slack", get(slack_messages))
        .route("/api/whatsapp", get(whatsapp_messages))
        .route("/api/messages", get(all_messages))
        .layer(middleware)
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-digest"
    }))
}

// ── Per-source endpoints ────────────────────────────────────────────────

async fn gmail_messages(State(state): State<AppState>) -> Response {
    respond(state.gmail.as_ref(), &state.summarizer).await
}

async fn slack_messages(State(state): State<AppState>) -> Response {
    respond(state.slack.as_ref(), &state.summarizer).await
}

async fn whatsapp_messages(State(state): State<AppState>) -> Response {
    respond(state.whatsapp.as_ref(), &state.summarizer).await
}

async fn respond<F: Fetcher>(fetcher: &F, summarizer: &Summarizer) -> Response {
    match fetcher.fetch(summarizer).await {
        Ok(data) => (StatusCode::OK, Json(Envelope::Success { data })).into_response(),
        Err(e) => error_response(fetcher.platform(), &e),
    }
}

fn error_response(platform: Platform, err: &SourceError) -> Response {
    let status = status_for(err);
    warn!(platform = %platform, status = status.as_u16(), error = %err, "Fetch failed");
    (
        status,
        Json(Envelope::<()>::Error {
            message: err.to_string(),
        }),
    )
        .into_response()
}

// ── Unified feed ────────────────────────────────────────────────────────

async fn all_messages(State(state): State<AppState>) -> Response {
    let feed = feed::collect(
        state.gmail.as_ref(),
        state.slack.as_ref(),
        state.whatsapp.as_ref(),
        &state.summarizer,
    )
    .await;

    feed_response(feed)
}

/// 502 only when no source produced a result. The WhatsApp stub cannot fail
/// today, so this is reached once it is backed by a real provider.
fn feed_response(feed: feed::Feed) -> Response {
    if feed.all_failed(FEED_SOURCES) {
        let message = feed
            .errors
            .iter()
            .map(|f| format!("{}: {}", f.platform, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        return (
            StatusCode::BAD_GATEWAY,
            Json(Envelope::<()>::Error { message }),
        )
            .into_response();
    }

    Json(FeedEnvelope {
        status: "success",
        data: feed.items,
        errors: feed.errors,
    })
    .into_response()
}
