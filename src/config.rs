//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Remote feed source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote API (e.g., "https://feed.example.com")
    pub base_url: String,
    /// Number of posts requested per refresh cycle
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info")
    pub level: String,
    /// Output format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEEDCACHE_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("database.path", "data/feed.db")?
            .set_default("remote.batch_size", 50)?
            .set_default("remote.timeout_seconds", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FEEDCACHE_*)
            .add_source(
                Environment::with_prefix("FEEDCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.remote.base_url.is_empty() {
            return Err(crate::error::AppError::Config(
                "remote.base_url must be set".to_string(),
            ));
        }

        if self.remote.batch_size == 0 {
            return Err(crate::error::AppError::Config(
                "remote.batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
