//! Data models
//!
//! Rust structs representing feed posts and their on-disk rows.
//! All models use chrono for timestamps; post IDs are assigned by the
//! remote source and treated as opaque strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// =============================================================================
// Post (decoded record)
// =============================================================================

/// One item of the feed
///
/// The same shape is used for posts arriving from the remote source
/// and for posts decoded back out of local storage, so a stored
/// payload always round-trips to the post that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Remote-assigned unique identifier
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: PostAuthor,
    /// Raw post text (presentation handles styling/link detection)
    pub text: String,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

/// Author of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub id: String,
    /// Handle like "user@domain" or "@user"
    pub handle: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Reference to an attached media object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub content_type: String,
    pub preview_url: Option<String>,
    pub description: Option<String>,
}

impl Post {
    /// Serialize into the on-disk row representation.
    ///
    /// The payload is the canonical JSON form of the full post, so
    /// storage never needs to understand the decoded schema.
    pub fn to_stored_row(&self) -> Result<StoredRow, AppError> {
        Ok(StoredRow {
            id: self.id.clone(),
            created_at: self.created_at,
            payload: serde_json::to_string(self)?,
        })
    }
}

// =============================================================================
// StoredRow (on-disk representation)
// =============================================================================

/// One row of the posts table
///
/// Schema is stable across versions: columns `id` (unique key),
/// `created_at`, `payload` (opaque serialized blob).
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub payload: String,
}

// =============================================================================
// FeedQuery
// =============================================================================

/// Query parameters for a sequential read over stored posts
///
/// Rows are always returned newest-first; the store defines the order,
/// the loader does not re-sort.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Maximum rows to read, or None for the full table
    pub limit: Option<u32>,
}
