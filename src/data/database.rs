//! SQLite database operations
//!
//! All database access goes through this module. The posts table is the
//! local cache of the remote feed: the refresh pipeline bulk-upserts
//! into it, the loader reads it back through a cursor.

use sqlx::{QueryBuilder, Row, SqlitePool};
use std::path::Path;
use tokio::sync::watch;

use super::cursor::SqliteRowCursor;
use super::models::{FeedQuery, StoredRow};
use crate::error::AppError;

/// Database connection pool wrapper.
///
/// Carries a revision counter that is bumped on every successful bulk
/// upsert; the loader's owner can subscribe to it to learn when the
/// underlying data changed.
pub struct Database {
    pool: SqlitePool,
    changes: watch::Sender<u64>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file and the posts table if they don't
    /// exist.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or schema creation fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts (created_at DESC)")
            .execute(&pool)
            .await?;

        tracing::info!(path = %path.display(), "Database connected");

        let (changes, _) = watch::channel(0);

        Ok(Self { pool, changes })
    }

    /// Insert or replace a batch of rows in one statement.
    ///
    /// Bumps the change revision on success so subscribers know to
    /// reload. An empty batch is a no-op and does not signal a change.
    ///
    /// # Returns
    /// Number of rows written
    pub async fn bulk_upsert(&self, rows: &[StoredRow]) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder =
            QueryBuilder::new("INSERT OR REPLACE INTO posts (id, created_at, payload) ");
        builder.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(row.created_at)
                .push_bind(&row.payload);
        });

        let result = builder.build().execute(&self.pool).await?;
        let written = result.rows_affected();

        self.changes.send_modify(|revision| *revision += 1);

        tracing::debug!(rows = written, "Bulk upsert completed");
        Ok(written)
    }

    /// Open a sequential read handle over stored posts, newest first.
    ///
    /// The cursor streams rows as they are fetched; close it when done
    /// with traversal (a dropped cursor cleans up as well).
    pub fn open_cursor(&self, query: FeedQuery) -> SqliteRowCursor {
        SqliteRowCursor::open(self.pool.clone(), query)
    }

    /// Subscribe to the change revision counter.
    ///
    /// The receiver's value increments on every successful bulk
    /// upsert. The loader's owner watches it and calls
    /// `note_content_changed` on the loader.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Count stored posts
    pub async fn count_posts(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }
}
