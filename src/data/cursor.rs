//! SQLite cursor source
//!
//! Streams rows out of the posts table one at a time. The SQLx fetch
//! stream borrows the pool, so traversal runs on a small bridging task
//! that feeds a bounded channel; the cursor handle owns the receiving
//! end and can be closed (or dropped) at any point mid-traversal.

use futures::StreamExt;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::models::{FeedQuery, StoredRow};
use crate::error::AppError;
use crate::service::loader::{CursorSource, RowCursor};

/// Rows buffered between the reader task and the cursor handle.
const CURSOR_CHANNEL_CAPACITY: usize = 64;

/// Sequential read handle over stored posts, newest first
pub struct SqliteRowCursor {
    rows: mpsc::Receiver<Result<StoredRow, AppError>>,
    reader: JoinHandle<()>,
}

impl SqliteRowCursor {
    /// Start a traversal over the posts table.
    pub(crate) fn open(pool: SqlitePool, query: FeedQuery) -> Self {
        let (tx, rows) = mpsc::channel(CURSOR_CHANNEL_CAPACITY);

        let reader = tokio::spawn(async move {
            // SQLite treats a negative LIMIT as "no limit"
            let limit = query.limit.map(i64::from).unwrap_or(-1);
            let mut stream = sqlx::query_as::<_, StoredRow>(
                "SELECT id, created_at, payload FROM posts ORDER BY created_at DESC LIMIT ?",
            )
            .bind(limit)
            .fetch(&pool);

            while let Some(row) = stream.next().await {
                let failed = row.is_err();
                if tx.send(row.map_err(AppError::from)).await.is_err() {
                    // Receiver closed mid-traversal
                    break;
                }
                if failed {
                    break;
                }
            }
        });

        Self { rows, reader }
    }
}

impl RowCursor for SqliteRowCursor {
    async fn next_row(&mut self) -> Result<Option<StoredRow>, AppError> {
        match self.rows.recv().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(error)) => Err(error),
            // Reader task finished: traversal is complete
            None => Ok(None),
        }
    }

    async fn close(self) -> Result<(), AppError> {
        drop(self.rows);
        self.reader.abort();
        Ok(())
    }
}

/// CursorSource backed by the local SQLite store
#[derive(Clone)]
pub struct SqliteCursorSource {
    db: Arc<super::Database>,
}

impl SqliteCursorSource {
    pub fn new(db: Arc<super::Database>) -> Self {
        Self { db }
    }
}

impl CursorSource for SqliteCursorSource {
    type Cursor = SqliteRowCursor;

    async fn open(&self, query: FeedQuery) -> Result<SqliteRowCursor, AppError> {
        Ok(self.db.open_cursor(query))
    }
}
