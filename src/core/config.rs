//! Collection configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! meta_cache_capacity = 1024
//! lock_ttl_ms = 5000
//!
//! [store]
//! type = "Redis"
//! url = "redis://127.0.0.1:6379/2"
//! ```

use crate::error::{CollectionError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Default number of bucket metadata entries kept in the local cache
pub const DEFAULT_META_CACHE_CAPACITY: usize = 1024;

/// Default lifetime of the advisory bucket lock
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5);

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Capacity of the bucket metadata LRU cache
    pub meta_cache_capacity: usize,

    /// Advisory lock lifetime in milliseconds
    pub lock_ttl_ms: u64,

    /// Backing store
    pub store: StoreConfig,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        CollectionsConfig {
            meta_cache_capacity: DEFAULT_META_CACHE_CAPACITY,
            lock_ttl_ms: DEFAULT_LOCK_TTL.as_millis() as u64,
            store: StoreConfig::default(),
        }
    }
}

impl CollectionsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CollectionsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Reject values that cannot be used to build collections
    pub fn validate(&self) -> Result<()> {
        self.cache_capacity()?;
        if self.lock_ttl_ms == 0 {
            return Err(CollectionError::Config(
                "lock_ttl_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.meta_cache_capacity).ok_or_else(|| {
            CollectionError::Config("meta_cache_capacity must be greater than zero".to_string())
        })
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }
}

/// Which store backs the collections
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// In-process store (tests, embedded use)
    #[default]
    InMemory,

    /// Redis server (requires the `redis` feature)
    Redis(RedisStoreConfig),
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisStoreConfig {
    /// Connection URL, e.g. "redis://127.0.0.1:6379/2"
    pub url: String,
}
