//! Refresh pipeline
//!
//! One fetch-then-store cycle, independent of the loader's read path:
//! pull a batch of recent posts from the remote source, serialize each
//! into its stored row, and bulk-upsert them in one statement. A
//! payload-free "refresh done" signal is broadcast when the cycle ends,
//! success or failure, so a caller-visible busy indicator is always
//! eventually cleared.
//!
//! The pipeline never pokes the loader: picking up new rows is driven
//! by the store's own change notification.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::data::{Database, Post};
use crate::error::AppError;
use crate::remote::RemoteSource;

/// Posts requested per refresh cycle unless overridden
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Named triggers accepted by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Fetch and store the configured batch of recent posts
    Refresh,
    /// Reserved: fetch a bounded page of older posts.
    ///
    /// Not implemented yet; fails with `AppError::Unsupported` so an
    /// accidental invocation cannot pass silently.
    Backfill {
        newest_id: String,
        oldest_id: String,
    },
}

/// Fetch-and-persist pipeline for the feed
pub struct RefreshPipeline<R> {
    remote: Arc<R>,
    db: Arc<Database>,
    /// Posts requested per [`Trigger::Refresh`] cycle
    batch_size: usize,
    done: broadcast::Sender<()>,
}

/// Fires the "refresh done" signal when dropped, so every exit path of
/// a cycle clears the caller's busy indicator.
struct DoneGuard(broadcast::Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        // Fire-and-forget: no receivers is fine
        let _ = self.0.send(());
    }
}

impl<R> RefreshPipeline<R>
where
    R: RemoteSource,
{
    /// Create a new pipeline over the given remote source and store
    pub fn new(remote: R, db: Arc<Database>) -> Self {
        let (done, _) = broadcast::channel(16);

        Self {
            remote: Arc::new(remote),
            db,
            batch_size: DEFAULT_BATCH_SIZE,
            done,
        }
    }

    /// Override the batch size used by [`Trigger::Refresh`]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Subscribe to the end-of-cycle signal.
    ///
    /// One `()` per finished refresh, success or failure. Used only to
    /// stop a busy indicator; outcome information travels on the
    /// return value of [`refresh`](Self::refresh).
    pub fn subscribe_done(&self) -> broadcast::Receiver<()> {
        self.done.subscribe()
    }

    /// Dispatch a named trigger.
    pub async fn handle(&self, trigger: Trigger) -> Result<u64, AppError> {
        match trigger {
            Trigger::Refresh => self.refresh(self.batch_size).await,
            Trigger::Backfill {
                newest_id,
                oldest_id,
            } => self.backfill(&newest_id, &oldest_id).await,
        }
    }

    /// Run one fetch-then-store cycle.
    ///
    /// On remote failure the store is left untouched; either way the
    /// done signal fires when this returns.
    ///
    /// # Returns
    /// Number of rows written
    pub async fn refresh(&self, limit: usize) -> Result<u64, AppError> {
        let started = Instant::now();
        let _done = DoneGuard(self.done.clone());

        let result = self.run_cycle(limit).await;
        match &result {
            Ok(written) => {
                crate::metrics::observe_refresh("success", started.elapsed());
                tracing::info!(rows = *written, "Refresh completed");
            }
            Err(error) => {
                crate::metrics::observe_refresh("error", started.elapsed());
                tracing::warn!(%error, "Refresh failed; store unchanged");
            }
        }
        result
    }

    async fn run_cycle(&self, limit: usize) -> Result<u64, AppError> {
        let posts = self.remote.fetch_recent(limit).await?;

        let rows = posts
            .iter()
            .map(Post::to_stored_row)
            .collect::<Result<Vec<_>, AppError>>()?;

        self.db.bulk_upsert(&rows).await
    }

    /// Reserved extension point for fetching older timeline pages.
    ///
    /// # Errors
    /// Always `AppError::Unsupported`.
    pub async fn backfill(&self, newest_id: &str, oldest_id: &str) -> Result<u64, AppError> {
        Err(AppError::Unsupported(format!(
            "backfill of timeline pages ({newest_id}..{oldest_id}) is not implemented"
        )))
    }
}
