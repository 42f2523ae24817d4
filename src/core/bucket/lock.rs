//! Advisory write lock on a bucket collection
//!
//! Cooperative only: writers that never call [`ShardedBucket::lock`] are not
//! stopped. Acquisition never waits; the lock expires on its own after the
//! configured TTL and is not renewed.

use super::{index_key, ShardedBucket};
use crate::error::{CollectionError, Result};
use tracing::debug;

fn lock_key(name: &str) -> String {
    format!("{}#WLOCK", index_key(name))
}

impl ShardedBucket {
    /// Try to take the lock for `name`, failing immediately if it is held
    pub fn lock(&self, name: &str) -> Result<()> {
        let key = lock_key(name);
        if self.store.exists(&key)? {
            return Err(CollectionError::LockHeld(name.to_string()));
        }
        if !self.store.set_nx_ex(&key, "1", self.lock_ttl)? {
            return Err(CollectionError::LockHeld(name.to_string()));
        }
        debug!("{}: locked for {:?}", name, self.lock_ttl);
        Ok(())
    }

    /// Release the lock for `name`, whoever holds it
    pub fn unlock(&self, name: &str) -> Result<()> {
        self.store.del(&lock_key(name))?;
        debug!("{}: unlocked", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bucket::MetaCache;
    use crate::core::store::{MemoryStore, Store};
    use std::sync::Arc;
    use std::time::Duration;

    fn bucket_with_ttl(ttl: Duration) -> (Arc<MemoryStore>, ShardedBucket) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MetaCache::new(16).unwrap());
        let bucket = ShardedBucket::with_cache(store.clone(), cache, ttl);
        (store, bucket)
    }

    #[test]
    fn test_lock_key_layout() {
        assert_eq!(lock_key("feed"), "feed#bucket_index#WLOCK");
    }

    #[test]
    fn test_lock_is_exclusive() {
        let (store, bucket) = bucket_with_ttl(Duration::from_secs(5));
        bucket.lock("feed").unwrap();
        assert!(store.exists("feed#bucket_index#WLOCK").unwrap());
        assert!(matches!(bucket.lock("feed"), Err(CollectionError::LockHeld(_))));

        // Other collections are unaffected
        bucket.lock("other").unwrap();
    }

    #[test]
    fn test_unlock_releases() {
        let (_store, bucket) = bucket_with_ttl(Duration::from_secs(5));
        bucket.lock("feed").unwrap();
        bucket.unlock("feed").unwrap();
        bucket.lock("feed").unwrap();

        // Unlocking a free lock is fine
        bucket.unlock("feed").unwrap();
        bucket.unlock("feed").unwrap();
    }

    #[test]
    fn test_lock_expires() {
        let (_store, bucket) = bucket_with_ttl(Duration::from_millis(100));
        bucket.lock("feed").unwrap();
        assert!(bucket.lock("feed").is_err());
        std::thread::sleep(Duration::from_millis(150));
        bucket.lock("feed").unwrap();
    }

    #[test]
    fn test_default_ttl_is_five_seconds() {
        let store = Arc::new(MemoryStore::new());
        let bucket = ShardedBucket::new(store).unwrap();
        assert_eq!(bucket.lock_ttl(), Duration::from_secs(5));
    }
}
