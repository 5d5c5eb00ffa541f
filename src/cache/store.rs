//! Tagged TTL cache
//!
//! DashMap-backed cache with per-entry TTL, ETags, oldest-first eviction and
//! invalidation of a tag within a branch.

use super::keys::CacheKey;
use super::CacheConfig;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cap applied when `now + ttl` does not fit in an `Instant`
const MAX_ENTRY_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// A cached value with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized payload (JSON)
    pub data: Vec<u8>,
    /// Quoted ETag (SHA256 prefix of data)
    pub etag: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let etag = compute_etag(&data);
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(MAX_ENTRY_LIFETIME_SECS));
        Self {
            data,
            etag,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Remaining TTL in seconds
    pub fn remaining_ttl_secs(&self) -> u64 {
        self.expires_at
            .saturating_duration_since(Instant::now())
            .as_secs()
    }
}

/// ETag over a payload
pub fn compute_etag(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("\"{}\"", hex::encode(&hash[..16]))
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Cache shared through application state
pub struct TaggedCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl TaggedCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let storage_key = key.to_storage_key();
        if let Some(entry) = self.entries.get(&storage_key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %storage_key, "Cache hit");
                return Some(entry.clone());
            }
            drop(entry);
            self.entries.remove(&storage_key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %storage_key, "Cache miss");
        None
    }

    /// Store a value with the configured revalidation interval
    pub fn set(&self, key: &CacheKey, data: Vec<u8>) -> CacheEntry {
        self.set_with_ttl(key, data, self.config.ttl)
    }

    pub fn set_with_ttl(&self, key: &CacheKey, data: Vec<u8>, ttl: Duration) -> CacheEntry {
        let entry = CacheEntry::new(data, ttl);
        let storage_key = key.to_storage_key();
        debug!(key = %storage_key, ttl_secs = ttl.as_secs(), "Cache set");
        self.entries.insert(storage_key, entry.clone());
        self.maybe_evict();
        entry
    }

    /// Drop every entry of a tag within a branch
    pub fn invalidate_tag(&self, branch: &str, tag: &str) -> usize {
        self.invalidate_prefix(&CacheKey::tag_prefix(branch, tag))
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let count = before.saturating_sub(self.entries.len());

        if count > 0 {
            self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
            debug!(prefix = prefix, count = count, "Invalidated cache entries");
        }
        count
    }

    /// Remove expired entries
    pub fn cleanup(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Evict oldest entries once over capacity
    fn maybe_evict(&self) {
        let len = self.entries.len();
        if len <= self.config.max_entries {
            return;
        }
        let to_evict = len - self.config.max_entries;

        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.created_at))
            .collect();
        entries.sort_by_key(|(_, created)| *created);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        debug!(evicted = to_evict, "Evicted cache entries");
    }
}

impl Default for TaggedCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Periodically sweep expired entries
pub fn spawn_cleanup_task(cache: Arc<TaggedCache>) {
    let interval = cache.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup();
            let stats = cache.stats();
            debug!(
                removed = removed,
                entries = stats.entries,
                hit_rate = format!("{:.1}%", stats.hit_rate()),
                "Cache cleanup completed"
            );
        }
    });

    info!("Cache cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::CATEGORIES_TAG;

    #[test]
    fn test_get_set_and_stats() {
        let cache = TaggedCache::with_defaults();
        let key = CacheKey::category_listing("main");

        assert!(cache.get(&key).is_none());
        let stored = cache.set(&key, b"[]".to_vec());
        let entry = cache.get(&key).expect("Should have entry");
        assert_eq!(entry.data, b"[]");
        assert_eq!(entry.etag, stored.etag);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expiry() {
        let cache = TaggedCache::with_defaults();
        let key = CacheKey::category_listing("main");
        cache.set_with_ttl(&key, b"x".to_vec(), Duration::from_millis(10));
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_invalidate_tag_is_branch_scoped() {
        let cache = TaggedCache::with_defaults();
        cache.set(&CacheKey::category_listing("main"), b"a".to_vec());
        cache.set(&CacheKey::category_listing("preview"), b"b".to_vec());
        cache.set(&CacheKey::new("main", "rules", "all"), b"c".to_vec());

        assert_eq!(cache.invalidate_tag("main", CATEGORIES_TAG), 1);
        assert!(cache.get(&CacheKey::category_listing("preview")).is_some());
        assert!(cache.get(&CacheKey::new("main", "rules", "all")).is_some());

        assert_eq!(cache.invalidate_tag("main", CATEGORIES_TAG), 0);
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_unbounded_ttl_is_capped() {
        let entry = CacheEntry::new(b"x".to_vec(), Duration::MAX);
        assert!(!entry.is_expired());
        assert!(entry.remaining_ttl_secs() <= MAX_ENTRY_LIFETIME_SECS);

        let cache = TaggedCache::with_defaults();
        let key = CacheKey::category_listing("main");
        cache.set_with_ttl(&key, b"x".to_vec(), Duration::from_secs(u64::MAX));
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let cache = TaggedCache::new(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        cache.set(&CacheKey::new("b1", "t", "k"), b"1".to_vec());
        std::thread::sleep(Duration::from_millis(2));
        cache.set(&CacheKey::new("b2", "t", "k"), b"2".to_vec());
        std::thread::sleep(Duration::from_millis(2));
        cache.set(&CacheKey::new("b3", "t", "k"), b"3".to_vec());

        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get(&CacheKey::new("b1", "t", "k")).is_none());
    }

    #[test]
    fn test_etag_is_content_addressed() {
        assert_eq!(compute_etag(b"same"), compute_etag(b"same"));
        assert_ne!(compute_etag(b"same"), compute_etag(b"different"));
    }
}
