//! Cache backend implementations.

use std::{
    sync::RwLock,
    time::{Duration, Instant},
};

use lru::LruCache;
use metrics::counter;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};
use super::{CacheBackend, CacheSetOptions};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "mason_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "mason_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "mason_cache_evict_total";

#[derive(Clone)]
struct CachedFragment {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedFragment {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process fragment cache with LRU eviction and optional expiry.
pub struct MemoryCache {
    entries: RwLock<LruCache<String, CachedFragment>>,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            default_ttl: config.default_ttl,
        }
    }

    pub fn invalidate(&self, key: &str) {
        rw_write(&self.entries, SOURCE, "invalidate").pop(key);
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Number of stored fragments, expired ones included until they are read.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let now = Instant::now();
        let lookup = entries
            .get(key)
            .map(|fragment| (!fragment.is_expired(now)).then(|| fragment.value.clone()));

        match lookup {
            Some(Some(value)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(value)
            }
            Some(None) => {
                entries.pop(key);
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    fn set(&self, key: &str, value: String, options: &CacheSetOptions) {
        let ttl = options.expires_in.or(self.default_ttl);
        let fragment = CachedFragment {
            value,
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };

        let displaced = rw_write(&self.entries, SOURCE, "set").push(key.to_string(), fragment);
        if let Some((evicted_key, _)) = displaced
            && evicted_key != key
        {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
    }
}

/// Backend used when caching is disabled: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheBackend for NullCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String, _options: &CacheSetOptions) {}
}
