use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use inbox_digest::api::{AppState, routes};
use inbox_digest::config::{AppConfig, ServerConfig};
use inbox_digest::llm::create_summarizer;
use inbox_digest::sources::{GmailFetcher, SlackFetcher, WhatsAppFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config.server)?;

    eprintln!("📬 inbox-digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", config.server.bind);
    eprintln!(
        "   Summarizer: {:?} ({})",
        config.summarizer.backend, config.summarizer.model
    );
    eprintln!("   Gmail token: {}", config.gmail.token_path.display());
    eprintln!(
        "   Slack: {}",
        match &config.slack {
            Some(slack) => format!("channel {}", slack.channel_id),
            None => "disabled (SLACK_TOKEN not set)".to_string(),
        }
    );
    eprintln!("   WhatsApp: sample data\n");

    let client = reqwest::Client::builder()
        .timeout(config.server.http_timeout)
        .user_agent(concat!("inbox-digest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    // Loaded once; every request shares this handle.
    let summarizer = Arc::new(
        create_summarizer(&config.summarizer, client.clone())
            .context("failed to create summarizer")?,
    );

    let state = AppState {
        summarizer,
        gmail: Arc::new(GmailFetcher::new(config.gmail.clone(), client.clone())),
        slack: Arc::new(SlackFetcher::new(config.slack.clone(), client.clone())),
        whatsapp: Arc::new(WhatsAppFetcher::new(config.whatsapp.clone())),
    };

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(addr = %config.server.bind, "HTTP server started");

    axum::serve(listener, routes(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Console logging plus, when a log directory is configured, a daily file.
fn init_tracing(server: &ServerConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match &server.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "inbox-digest.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
