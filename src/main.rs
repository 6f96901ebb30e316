//! Feedcache binary entry point
//!
//! Runs one refresh-and-load cycle against the configured remote feed:
//! fetch recent posts, persist them, then load the cached timeline and
//! log what would be handed to the UI.

use feedcache::data::FeedQuery;
use feedcache::service::{ResultList, Trigger};
use feedcache::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Run one refresh cycle
/// 5. Load and deliver the cached timeline
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("FEEDCACHE__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "feedcache=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "feedcache=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting feedcache...");

    // 2. Initialize metrics
    feedcache::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        base_url = %config.remote.base_url,
        batch_size = config.remote.batch_size,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config).await?;

    // 5. Run one refresh cycle (busy indicator cleared via done signal)
    let pipeline = state.refresh_pipeline();
    let mut done = pipeline.subscribe_done();
    if let Err(error) = pipeline.handle(Trigger::Refresh).await {
        tracing::warn!(%error, "Refresh failed; serving cached posts only");
    }
    let _ = done.recv().await;

    // 6. Load and deliver the cached timeline
    let mut loader = state.timeline_loader(FeedQuery::default(), |result: ResultList| {
        tracing::info!(posts = result.len(), "Timeline delivered");
        for post in result.iter().take(10) {
            tracing::info!(
                id = %post.id,
                author = %post.author.handle,
                created_at = %post.created_at,
                "{}",
                post.text
            );
        }
    });

    loader.start()?;
    if loader.is_loading() {
        loader.drive().await?;
    }
    loader.reset();

    Ok(())
}
