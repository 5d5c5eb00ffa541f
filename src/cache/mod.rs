//! Category listing cache
//!
//! One [`TaggedCache`] is built at start-up and shared through application
//! state. Entries are keyed per content branch and tag (see [`keys`]) and
//! revalidate after a fixed interval; mutations invalidate their tag.

pub mod keys;
pub mod store;

pub use keys::{CacheKey, CATEGORIES_TAG};
pub use store::{compute_etag, spawn_cleanup_task, CacheEntry, CacheStats, TaggedCache};

use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Revalidation interval
    pub ttl: Duration,
    /// Sweep interval for expired entries
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            ..Default::default()
        }
    }
}
