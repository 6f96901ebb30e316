//! Feedcache - a client-side feed cache and loading layer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Embedding application                    │
//! │  - owns the loader lifecycle (start/stop/reset)             │
//! │  - watches the store's change notification                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │  - CachedLoader (single-flight loads, cached delivery)      │
//! │  - RefreshPipeline (fetch → bulk upsert → done signal)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                             │
//! │  - SQLite (sqlx), posts table                               │
//! │  - cursor streaming + JSON payload decoding                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `service`: the cached loader state machine and refresh pipeline
//! - `data`: SQLite store, cursor source, payload decoder, models
//! - `remote`: remote feed source contract and HTTP implementation
//! - `config`: configuration management
//! - `error`: error types

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod remote;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use data::{FeedQuery, JsonRecordDecoder, SqliteCursorSource};
use remote::HttpRemoteSource;
use service::{CachedLoader, RefreshPipeline, ResultObserver};

/// Application state shared across the loader and pipeline
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// HTTP client for the remote feed API
    pub http_client: Arc<reqwest::Client>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (creating the schema)
    /// 2. Build the HTTP client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;

        let http_client = reqwest::Client::builder()
            .user_agent("Feedcache/0.1.0")
            .timeout(Duration::from_secs(config.remote.timeout_seconds))
            .build()?;

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            http_client: Arc::new(http_client),
        })
    }

    /// Build a refresh pipeline against the configured remote source
    pub fn refresh_pipeline(&self) -> RefreshPipeline<HttpRemoteSource> {
        let remote = HttpRemoteSource::new(
            Arc::clone(&self.http_client),
            self.config.remote.base_url.clone(),
        );
        RefreshPipeline::new(remote, Arc::clone(&self.db))
            .with_batch_size(self.config.remote.batch_size)
    }

    /// Build a cached loader over the local store for one feed query.
    ///
    /// Each loader serves a single logical query; create a new one per
    /// query (and after `reset()`).
    pub fn timeline_loader<O>(
        &self,
        query: FeedQuery,
        observer: O,
    ) -> CachedLoader<SqliteCursorSource, JsonRecordDecoder, O>
    where
        O: ResultObserver,
    {
        CachedLoader::new(
            SqliteCursorSource::new(Arc::clone(&self.db)),
            JsonRecordDecoder,
            query,
            observer,
        )
    }
}
