//! Fragment cache configuration, controlled through the `[cache]` settings table.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When disabled, the `Cache` filter renders on every call.
    pub enabled: bool,
    /// Maximum number of cached fragments before LRU eviction.
    pub capacity: usize,
    /// Expiry applied when the filter does not specify one.
    pub default_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            default_ttl: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            default_ttl: settings.default_ttl,
        }
    }
}

impl CacheConfig {
    /// Capacity as `NonZeroUsize`, clamped to 1.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
