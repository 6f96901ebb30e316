//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Loader metrics
    pub static ref LOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedcache_loads_total", "Total number of background load cycles"),
        &["result"]
    ).expect("metric can be created");

    // Refresh metrics
    pub static ref REFRESHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedcache_refreshes_total", "Total number of refresh cycles"),
        &["result"]
    ).expect("metric can be created");
    pub static ref REFRESH_DURATION_SECONDS: prometheus::Histogram = prometheus::Histogram::with_opts(
        HistogramOpts::new(
            "feedcache_refresh_duration_seconds",
            "Refresh cycle duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    ).expect("metric can be created");

    // Cache metrics
    pub static ref CACHED_POSTS: IntGauge = IntGauge::new(
        "feedcache_cached_posts",
        "Number of posts in the last delivered result list"
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; duplicate registrations are ignored.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(LOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REFRESHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REFRESH_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CACHED_POSTS.clone()));
}

/// Record the outcome of a refresh cycle.
pub fn observe_refresh(status: &str, elapsed: std::time::Duration) {
    REFRESHES_TOTAL.with_label_values(&[status]).inc();
    REFRESH_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}
