//! Cached feed loader
//!
//! Runs at most one background load at a time, caches the most recent
//! successful result list, and delivers results to an observer under
//! the loader lifecycle: redeliver the cached result on restart,
//! single-flight loads, best-effort cancellation on stop, and no
//! delivery after reset.
//!
//! All `&mut self` methods belong to one logical owner task (the
//! embedding application serializes them); only the load itself runs
//! on a spawned task, reporting back through a completion channel that
//! [`CachedLoader::drive`] drains.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::data::{FeedQuery, Post, StoredRow};
use crate::error::AppError;

/// Result of one load cycle, shared read-only with the observer.
///
/// The observer must not assume the list stays current past the next
/// delivery; its clone of the handle stays valid for as long as it is
/// held.
pub type ResultList = Arc<Vec<Post>>;

// =============================================================================
// Capabilities
// =============================================================================

/// Opens a sequential read over the store for the current query
pub trait CursorSource: Send + Sync + 'static {
    type Cursor: RowCursor;

    fn open(
        &self,
        query: FeedQuery,
    ) -> impl Future<Output = Result<Self::Cursor, AppError>> + Send;
}

/// Sequential read handle yielding stored rows in store-defined order
pub trait RowCursor: Send + 'static {
    /// Next row, or None when traversal is complete
    fn next_row(&mut self) -> impl Future<Output = Result<Option<StoredRow>, AppError>> + Send;

    /// Release the read handle.
    ///
    /// Called unconditionally when a load ends; failures are logged by
    /// the loader and never fail the load.
    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Decodes a stored row into a post. Pure and synchronous.
pub trait RecordDecoder: Send + Sync + 'static {
    fn decode(&self, row: &StoredRow) -> Result<Post, AppError>;
}

/// Receives result lists on the owner task
pub trait ResultObserver: Send + 'static {
    fn on_result(&mut self, result: ResultList);
}

impl<F> ResultObserver for F
where
    F: FnMut(ResultList) + Send + 'static,
{
    fn on_result(&mut self, result: ResultList) {
        self(result)
    }
}

// =============================================================================
// Lifecycle state
// =============================================================================

/// Loader lifecycle state
///
/// `Loading` and `Delivered` are per-cycle refinements of the started
/// state; `Reset` is terminal (a new loader instance is created to
/// restart).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Started,
    Loading,
    Delivered,
    Stopped,
    Reset,
}

struct LoadCompletion {
    /// Generation the load was started under; stale completions are
    /// routed to cancel instead of delivery
    generation: u64,
    outcome: Result<ResultList, AppError>,
}

// =============================================================================
// CachedLoader
// =============================================================================

/// Asynchronous cached loader for one logical feed query
pub struct CachedLoader<S, D, O> {
    source: Arc<S>,
    decoder: Arc<D>,
    observer: O,
    query: FeedQuery,
    state: LoaderState,
    /// Last successful result; redelivered on restart
    cached: Option<ResultList>,
    /// Latched change notification, consumed by the next start()
    content_changed: bool,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    completion_tx: mpsc::UnboundedSender<LoadCompletion>,
    completion_rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl<S, D, O> CachedLoader<S, D, O>
where
    S: CursorSource,
    D: RecordDecoder,
    O: ResultObserver,
{
    /// Create a loader in the Idle state.
    ///
    /// One loader serves one logical feed query; it is not shared
    /// across queries.
    pub fn new(source: S, decoder: D, query: FeedQuery, observer: O) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        Self {
            source: Arc::new(source),
            decoder: Arc::new(decoder),
            observer,
            query,
            state: LoaderState::Idle,
            cached: None,
            content_changed: false,
            generation: 0,
            in_flight: None,
            completion_tx,
            completion_rx,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Last successful result, if any
    pub fn cached_result(&self) -> Option<&ResultList> {
        self.cached.as_ref()
    }

    /// Whether a background load is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_started(&self) -> bool {
        matches!(
            self.state,
            LoaderState::Started | LoaderState::Loading | LoaderState::Delivered
        )
    }

    /// Start (or restart) the loader.
    ///
    /// Redelivers the cached non-empty result immediately, then
    /// triggers a new load when the data changed since the cache was
    /// taken, or when no usable cached result exists.
    ///
    /// # Errors
    /// `AppError::Lifecycle` if the loader was reset (one-shot
    /// lifecycle; create a new instance instead).
    pub fn start(&mut self) -> Result<(), AppError> {
        if self.state == LoaderState::Reset {
            return Err(AppError::Lifecycle(
                "loader cannot be restarted after reset".to_string(),
            ));
        }

        self.state = if self.in_flight.is_some() {
            LoaderState::Loading
        } else {
            LoaderState::Started
        };

        if let Some(cached) = self.cached.clone() {
            if !cached.is_empty() {
                self.deliver_result(cached);
            }
        }

        let changed = std::mem::take(&mut self.content_changed);
        let cache_unusable = self.cached.as_ref().is_none_or(|c| c.is_empty());
        if changed || cache_unusable {
            self.force_load()?;
        }

        Ok(())
    }

    /// Stop the loader, canceling the in-flight load best-effort.
    ///
    /// The cached result is kept and redelivered on the next start().
    pub fn stop(&mut self) {
        if self.state == LoaderState::Reset {
            return;
        }
        self.cancel_in_flight();
        self.state = LoaderState::Stopped;
    }

    /// Unconditionally request a new background load.
    ///
    /// No-op while a load is already in flight (single-flight). The
    /// load's outcome is applied by the next [`drive`](Self::drive)
    /// call, which also surfaces its error.
    pub fn force_load(&mut self) -> Result<(), AppError> {
        if self.state == LoaderState::Reset {
            return Err(AppError::Lifecycle(
                "loader cannot load after reset".to_string(),
            ));
        }
        if self.in_flight.is_some() {
            tracing::trace!("Load already in flight; request ignored");
            return Ok(());
        }

        let source = Arc::clone(&self.source);
        let decoder = Arc::clone(&self.decoder);
        let query = self.query.clone();
        let generation = self.generation;
        let completion_tx = self.completion_tx.clone();

        let handle = tokio::spawn(async move {
            let outcome = run_load(source.as_ref(), decoder.as_ref(), query).await;
            let _ = completion_tx.send(LoadCompletion {
                generation,
                outcome,
            });
        });

        self.in_flight = Some(handle);
        self.state = LoaderState::Loading;
        Ok(())
    }

    /// Wait for the next load completion and apply it.
    ///
    /// Routes a current-generation success to
    /// [`deliver_result`](Self::deliver_result), a stale completion to
    /// [`cancel`](Self::cancel), and returns the error of a failed
    /// cycle (cache untouched, previous result stays authoritative).
    ///
    /// Call after a load was triggered; awaits indefinitely otherwise.
    pub async fn drive(&mut self) -> Result<(), AppError> {
        let Some(completion) = self.completion_rx.recv().await else {
            // Unreachable: the loader holds a sender for its own channel
            return Ok(());
        };
        self.apply_completion(completion)
    }

    fn apply_completion(&mut self, completion: LoadCompletion) -> Result<(), AppError> {
        if completion.generation != self.generation {
            // The load this result belongs to was canceled
            if let Ok(result) = completion.outcome {
                self.cancel(result);
            }
            return Ok(());
        }

        self.in_flight = None;

        match completion.outcome {
            Ok(result) => {
                crate::metrics::LOADS_TOTAL.with_label_values(&["success"]).inc();
                self.deliver_result(result);
                Ok(())
            }
            Err(error) => {
                crate::metrics::LOADS_TOTAL.with_label_values(&["error"]).inc();
                if self.state == LoaderState::Loading {
                    self.state = LoaderState::Started;
                }
                tracing::warn!(%error, "Load cycle failed; keeping previous result");
                Err(error)
            }
        }
    }

    /// Accept a completed load's result.
    ///
    /// Discards the result after reset. Otherwise the cache is
    /// replaced, the observer is notified if the loader is started,
    /// and only then is the previous result released (unless it is the
    /// very list just delivered, or empty).
    pub fn deliver_result(&mut self, result: ResultList) {
        if self.state == LoaderState::Reset {
            tracing::debug!(posts = result.len(), "Discarding result delivered after reset");
            release(result);
            return;
        }

        let previous = self.cached.replace(Arc::clone(&result));

        if self.is_started() {
            crate::metrics::CACHED_POSTS.set(result.len() as i64);
            self.state = LoaderState::Delivered;
            self.observer.on_result(Arc::clone(&result));
        }

        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous, &result) && !previous.is_empty() {
                release(previous);
            }
        }
    }

    /// Handle a load aborted before producing a usable result.
    ///
    /// The partial result is released immediately.
    pub fn cancel(&mut self, result: ResultList) {
        crate::metrics::LOADS_TOTAL.with_label_values(&["canceled"]).inc();
        tracing::debug!(posts = result.len(), "Load canceled; releasing partial result");
        release(result);
    }

    /// Tear the loader down.
    ///
    /// Stops any in-flight load, releases the cached result, and moves
    /// to the terminal Reset state. Results from loads started before
    /// this call never reach the observer.
    pub fn reset(&mut self) {
        self.cancel_in_flight();
        if let Some(cached) = self.cached.take() {
            if !cached.is_empty() {
                release(cached);
            }
        }
        self.content_changed = false;
        self.state = LoaderState::Reset;
    }

    /// Record that the underlying data changed.
    ///
    /// Reloads immediately while started; otherwise latches the change
    /// for the next start(). Wired to the store's change notification
    /// by the embedding application.
    pub fn note_content_changed(&mut self) {
        if self.state == LoaderState::Reset {
            return;
        }
        if self.is_started() {
            // Cannot fail: the Reset case is excluded above
            let _ = self.force_load();
        } else {
            self.content_changed = true;
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
            // A completion already queued for this load is now stale
            // and will be routed to cancel() instead of the observer
            self.generation += 1;
        }
    }
}

/// Release a result list.
///
/// Disposal is ownership-based: dropping the last handle frees the
/// posts, while clones handed to the observer stay valid until the
/// observer lets go of them.
fn release(list: ResultList) {
    tracing::trace!(posts = list.len(), "Releasing result list");
    drop(list);
}

/// One background load cycle: open a cursor, decode every row in
/// order, close the cursor unconditionally.
///
/// A read or decode failure aborts the cycle; the close error, if any,
/// is logged and never fails an otherwise successful load.
async fn run_load<S, D>(source: &S, decoder: &D, query: FeedQuery) -> Result<ResultList, AppError>
where
    S: CursorSource,
    D: RecordDecoder,
{
    let mut cursor = source.open(query).await?;

    let mut posts = Vec::new();
    let outcome = loop {
        match cursor.next_row().await {
            Ok(Some(row)) => match decoder.decode(&row) {
                Ok(post) => posts.push(post),
                Err(error) => break Err(error),
            },
            Ok(None) => break Ok(()),
            Err(error) => break Err(error),
        }
    };

    if let Err(error) = cursor.close().await {
        tracing::warn!(%error, "Failed to close row cursor");
    }

    outcome.map(|()| Arc::new(posts))
}
