//! Remote feed source
//!
//! Contract: `fetch_recent(limit)` returns up to `limit` most-recent
//! posts as an ordered batch, newest first. Transport failures map to
//! `AppError::Network`, credential rejections to `AppError::Auth`.

use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;

use crate::data::Post;
use crate::error::AppError;

/// Source of recent feed posts
pub trait RemoteSource: Send + Sync + 'static {
    fn fetch_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Post>, AppError>> + Send;
}

/// RemoteSource over the feed HTTP API
#[derive(Clone)]
pub struct HttpRemoteSource {
    http_client: Arc<reqwest::Client>,
    base_url: String,
}

impl HttpRemoteSource {
    /// Create a new remote source
    ///
    /// # Arguments
    /// * `http_client` - Shared client (user agent and timeout already configured)
    /// * `base_url` - API base URL, e.g. "https://feed.example.com"
    pub fn new(http_client: Arc<reqwest::Client>, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }
}

impl RemoteSource for HttpRemoteSource {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Post>, AppError> {
        let url = format!(
            "{}/api/v1/timeline/home",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(AppError::Auth);
        }

        let posts: Vec<Post> = response.error_for_status()?.json().await?;

        tracing::debug!(requested = limit, received = posts.len(), "Fetched recent posts");
        Ok(posts)
    }
}
