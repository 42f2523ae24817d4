//! LRU cache for bucket metadata
//!
//! Shared by every caller of one [`ShardedBucket`](super::ShardedBucket) (or
//! several, when injected). Entries leave only by LRU eviction or explicit
//! invalidation, never by age.

use super::BucketMeta;
use crate::error::{CollectionError, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// LRU cache of bucket metadata keyed by collection name
pub struct MetaCache {
    cache: Mutex<LruCache<String, BucketMeta>>,
}

impl MetaCache {
    /// Create a new metadata cache with given capacity
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            CollectionError::Config("meta cache capacity must be greater than zero".to_string())
        })?;
        Ok(Self::with_capacity(capacity))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        MetaCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get cached metadata, marking it most recently used
    pub fn get(&self, name: &str) -> Option<BucketMeta> {
        self.cache.lock().get(name).cloned()
    }

    /// Put metadata in cache; last writer wins
    pub fn put(&self, meta: BucketMeta) {
        self.cache.lock().put(meta.name.clone(), meta);
    }

    /// Drop one entry
    pub fn invalidate(&self, name: &str) -> Option<BucketMeta> {
        self.cache.lock().pop(name)
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }
}
