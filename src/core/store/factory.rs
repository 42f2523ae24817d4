//! Store factory for creating stores from configuration.

use super::{MemoryStore, Store};
use crate::core::config::StoreConfig;
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Creates a store instance based on the provided configuration.
///
/// # Examples
///
/// ```
/// use redis_collections::{open_store, StoreConfig};
///
/// let store = open_store(&StoreConfig::InMemory).unwrap();
/// assert!(!store.exists("anything").unwrap());
/// ```
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config {
        StoreConfig::InMemory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Redis(redis_config) => open_redis(&redis_config.url),
    }
}

#[cfg(feature = "redis")]
fn open_redis(url: &str) -> Result<Arc<dyn Store>> {
    let store = super::RedisStore::connect(url)?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
fn open_redis(url: &str) -> Result<Arc<dyn Store>> {
    Err(crate::error::CollectionError::Config(format!(
        "redis store requested ({}) but the `redis` feature is disabled",
        url
    )))
}
