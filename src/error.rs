//! Error types for feedcache
//!
//! All errors in the crate are converted to `AppError`. A failed load
//! or refresh cycle surfaces its error to the caller; the only
//! swallowed failures are cursor-close errors during a load, which are
//! logged at the call site instead.

use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// A stored row's payload could not be decoded.
    ///
    /// Aborts the current load cycle only; the previously cached
    /// result stays authoritative.
    #[error("Failed to decode stored post: {0}")]
    Decode(#[from] serde_json::Error),

    /// Read or write against the local store failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Remote fetch failed at the transport level
    #[error("HTTP client error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote source rejected our credentials
    #[error("Authentication rejected by remote source")]
    Auth,

    /// Reserved operation that is not implemented yet
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Loader lifecycle violation (e.g. starting a reset loader)
    #[error("Loader lifecycle violation: {0}")]
    Lifecycle(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
