//! Fragment cache used by the `Cache` filter.
//!
//! The backend is shared by every request rendered by a process, so
//! implementations must be `Send + Sync`. Configuration lives in the
//! `[cache]` table:
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! default_ttl_seconds = 300
//! ```

mod config;
mod lock;
mod store;

use std::{sync::Arc, time::Duration};

pub use config::CacheConfig;
pub use store::{MemoryCache, NullCache};

pub(crate) use store::{METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS};

/// Options passed along with a value when it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSetOptions {
    pub expires_in: Option<Duration>,
}

pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, options: &CacheSetOptions);
}

/// Build the backend described by `config`.
pub fn backend_from_config(config: &CacheConfig) -> Arc<dyn CacheBackend> {
    if config.enabled {
        Arc::new(MemoryCache::new(config))
    } else {
        Arc::new(NullCache)
    }
}
