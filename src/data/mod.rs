//! Data layer
//!
//! Local SQLite store for feed posts plus the read/decode adapters the
//! loader is built from.

mod cursor;
mod database;
mod decoder;
mod models;


pub use cursor::{SqliteCursorSource, SqliteRowCursor};
pub use database::Database;
pub use decoder::JsonRecordDecoder;
pub use models::{FeedQuery, MediaRef, Post, PostAuthor, StoredRow};
