//! Sharded bucket collections
//!
//! A named collection is spread over `bucket_count` hash keys. The shard of a
//! member is `crc32(member) % bucket_count`, so routing needs nothing but the
//! collection name, its bucket count, and the member itself:
//!
//! ```text
//! <name>#bucket_index        metadata hash {bucket_count, count}
//! <name>#bucket_index#WLOCK  advisory lock (short TTL)
//! <name>#0 .. <name>#N-1     shard hashes
//! ```
//!
//! Collections are permanent once created; the bucket count never changes.
//! Metadata is served from an LRU cache and re-read on request. `count` is
//! advisory and not kept in lockstep with shard contents.

mod cache;
mod lock;

pub use cache::MetaCache;

use crate::codec::{self, FieldMap};
use crate::core::config::{CollectionsConfig, DEFAULT_LOCK_TTL, DEFAULT_META_CACHE_CAPACITY};
use crate::core::store::Store;
use crate::error::{CollectionError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fewest shards a collection may have
pub const MIN_BUCKET_COUNT: u32 = 2;

/// Most shards a collection may have
pub const MAX_BUCKET_COUNT: u32 = 5;

/// Metadata of one sharded collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketMeta {
    pub name: String,
    pub bucket_count: u32,
    /// Advisory item count
    pub count: u64,
}

crate::impl_record!(BucketMeta { bucket_count, count });

impl BucketMeta {
    /// Shard hash key holding `member`
    pub fn bucket_key(&self, member: &str) -> Result<String> {
        bucket_key(&self.name, self.bucket_count, member).ok_or(
            CollectionError::BucketCountTooLow {
                requested: self.bucket_count,
                min: MIN_BUCKET_COUNT,
            },
        )
    }
}

/// Shard index of `member`; `None` when `bucket_count` is zero
pub fn shard_of(member: &str, bucket_count: u32) -> Option<u32> {
    crc32fast::hash(member.as_bytes()).checked_rem(bucket_count)
}

/// Physical key `<name>#<shard>` for `member`
pub fn bucket_key(name: &str, bucket_count: u32, member: &str) -> Option<String> {
    shard_of(member, bucket_count).map(|shard| format!("{}#{}", name, shard))
}

/// Metadata hash key of a collection
pub fn index_key(name: &str) -> String {
    format!("{}#bucket_index", name)
}

fn check_bucket_count(bucket_count: u32) -> Result<()> {
    if bucket_count > MAX_BUCKET_COUNT {
        return Err(CollectionError::BucketCountTooHigh {
            requested: bucket_count,
            max: MAX_BUCKET_COUNT,
        });
    }
    if bucket_count < MIN_BUCKET_COUNT {
        return Err(CollectionError::BucketCountTooLow {
            requested: bucket_count,
            min: MIN_BUCKET_COUNT,
        });
    }
    Ok(())
}

/// Sharded collections over one store
pub struct ShardedBucket {
    store: Arc<dyn Store>,
    cache: Arc<MetaCache>,
    lock_ttl: Duration,
}

impl ShardedBucket {
    /// Default cache (1024 entries) and 5 second lock TTL
    pub fn new(store: Arc<dyn Store>) -> Result<Self> {
        let cache = MetaCache::new(DEFAULT_META_CACHE_CAPACITY)?;
        Ok(Self::with_cache(store, Arc::new(cache), DEFAULT_LOCK_TTL))
    }

    pub fn with_config(store: Arc<dyn Store>, config: &CollectionsConfig) -> Result<Self> {
        config.validate()?;
        let cache = MetaCache::with_capacity(config.cache_capacity()?);
        Ok(Self::with_cache(store, Arc::new(cache), config.lock_ttl()))
    }

    /// Share an existing metadata cache
    pub fn with_cache(store: Arc<dyn Store>, cache: Arc<MetaCache>, lock_ttl: Duration) -> Self {
        ShardedBucket {
            store,
            cache,
            lock_ttl,
        }
    }

    pub fn cache(&self) -> &Arc<MetaCache> {
        &self.cache
    }

    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Create collection `name` with a fixed number of shards
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the collection was created before (checked first),
    /// `BucketCountTooHigh`/`BucketCountTooLow` outside `[2, 5]`.
    pub fn create(&self, name: &str, bucket_count: u32) -> Result<()> {
        if self.exists(name)? {
            return Err(CollectionError::AlreadyExists(name.to_string()));
        }
        check_bucket_count(bucket_count)?;

        let meta = BucketMeta {
            name: name.to_string(),
            bucket_count,
            count: 0,
        };
        // One command, so a concurrent refresh never sees half a record
        let fields: Vec<(String, String)> = codec::flatten(&meta)?.into_iter().collect();
        self.store.hset_multiple(&index_key(name), &fields)?;

        self.cache.put(meta);
        info!("Bucket collection created: {} ({} shards)", name, bucket_count);
        Ok(())
    }

    /// Metadata for `name`, from cache unless `refresh` is set or it is not cached
    pub fn meta(&self, name: &str, refresh: bool) -> Result<BucketMeta> {
        if !refresh {
            if let Some(meta) = self.cache.get(name) {
                return Ok(meta);
            }
        }

        let raw: FieldMap = self.store.hgetall(&index_key(name))?;
        if raw.is_empty() {
            return Err(CollectionError::NotFound(name.to_string()));
        }

        let mut meta = BucketMeta {
            name: name.to_string(),
            ..BucketMeta::default()
        };
        let warnings = codec::populate(&mut meta, &raw)?;
        if !warnings.is_empty() {
            warn!("{}: {} unreadable metadata fields", name, warnings.len());
        }
        if let Err(err) = check_bucket_count(meta.bucket_count) {
            return Err(CollectionError::SchemaMismatch(format!(
                "{} metadata is unusable: {}",
                name, err
            )));
        }

        debug!("{}: metadata refreshed ({:?})", name, meta);
        self.cache.put(meta.clone());
        Ok(meta)
    }

    /// Advisory item count, always re-read from the store
    pub fn size(&self, name: &str) -> Result<u64> {
        Ok(self.meta(name, true)?.count)
    }

    /// Whether the metadata record exists, bypassing the cache
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.store.exists(&index_key(name))?)
    }

    /// Shard hash key for `member` of collection `name`
    pub fn bucket_key(&self, name: &str, member: &str) -> Result<String> {
        self.meta(name, false)?.bucket_key(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use std::collections::HashSet;

    fn setup() -> (Arc<MemoryStore>, ShardedBucket) {
        let store = Arc::new(MemoryStore::new());
        let bucket = ShardedBucket::new(store.clone()).unwrap();
        (store, bucket)
    }

    #[test]
    fn test_create_writes_metadata() {
        let (store, bucket) = setup();
        bucket.create("feed", 3).unwrap();

        let raw = store.hgetall("feed#bucket_index").unwrap();
        assert_eq!(raw["bucket_count"], "3");
        assert_eq!(raw["count"], "0");
        assert!(bucket.exists("feed").unwrap());
    }

    #[test]
    fn test_create_bucket_count_bounds() {
        let (_store, bucket) = setup();
        assert!(matches!(
            bucket.create("a", 1),
            Err(CollectionError::BucketCountTooLow { requested: 1, min: 2 })
        ));
        assert!(matches!(
            bucket.create("b", 6),
            Err(CollectionError::BucketCountTooHigh { requested: 6, max: 5 })
        ));
        bucket.create("c", 2).unwrap();
        bucket.create("d", 5).unwrap();
        assert!(!bucket.exists("a").unwrap());
        assert!(!bucket.exists("b").unwrap());
    }

    #[test]
    fn test_create_existing_with_bad_count() {
        let (store, bucket) = setup();
        bucket.create("feed", 3).unwrap();
        assert!(matches!(
            bucket.create("feed", 9),
            Err(CollectionError::AlreadyExists(_))
        ));
        assert!(matches!(
            bucket.create("feed", 0),
            Err(CollectionError::AlreadyExists(_))
        ));
        assert_eq!(store.hget("feed#bucket_index", "bucket_count").unwrap(), Some("3".to_string()));
    }

    #[test]
    fn test_create_writes_metadata_in_one_command() {
        let (store, bucket) = setup();
        let before = store.round_trips();
        bucket.create("feed", 2).unwrap();
        // exists + a single multi-field write
        assert_eq!(store.round_trips() - before, 2);
    }

    #[test]
    fn test_create_twice() {
        let (_store, bucket) = setup();
        bucket.create("feed", 2).unwrap();
        assert!(matches!(
            bucket.create("feed", 3),
            Err(CollectionError::AlreadyExists(_))
        ));
        assert_eq!(bucket.meta("feed", true).unwrap().bucket_count, 2);
    }

    #[test]
    fn test_meta_cache_hit_skips_store() {
        let (store, bucket) = setup();
        bucket.create("feed", 4).unwrap();

        let before = store.round_trips();
        let meta = bucket.meta("feed", false).unwrap();
        assert_eq!(store.round_trips(), before);
        assert_eq!(
            meta,
            BucketMeta {
                name: "feed".to_string(),
                bucket_count: 4,
                count: 0
            }
        );

        bucket.meta("feed", true).unwrap();
        assert_eq!(store.round_trips(), before + 1);
    }

    #[test]
    fn test_meta_miss_reads_store() {
        let (store, bucket) = setup();
        bucket.create("feed", 2).unwrap();
        bucket.cache().clear();

        store.hset("feed#bucket_index", "count", "42").unwrap();
        let meta = bucket.meta("feed", false).unwrap();
        assert_eq!(meta.count, 42);
        assert_eq!(bucket.cache().get("feed"), Some(meta));
    }

    #[test]
    fn test_meta_unknown_collection() {
        let (_store, bucket) = setup();
        assert!(matches!(
            bucket.meta("ghost", false),
            Err(CollectionError::NotFound(_))
        ));
        assert!(matches!(bucket.size("ghost"), Err(CollectionError::NotFound(_))));
    }

    #[test]
    fn test_size_always_refreshes() {
        let (store, bucket) = setup();
        bucket.create("feed", 2).unwrap();
        store.hincrby("feed#bucket_index", "count", 5).unwrap();

        // Cached copy is stale, size is not
        assert_eq!(bucket.meta("feed", false).unwrap().count, 0);
        assert_eq!(bucket.size("feed").unwrap(), 5);
        assert_eq!(bucket.meta("feed", false).unwrap().count, 5);
    }

    #[test]
    fn test_corrupt_bucket_count_is_rejected() {
        let (store, bucket) = setup();
        store.hset("broken#bucket_index", "bucket_count", "0").unwrap();
        assert!(matches!(
            bucket.meta("broken", true),
            Err(CollectionError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_bucket_key_is_deterministic() {
        let (_store, bucket) = setup();
        bucket.create("feed", 3).unwrap();

        let key = bucket.bucket_key("feed", "member-1").unwrap();
        let shard = crc32fast::hash(b"member-1") % 3;
        assert_eq!(key, format!("feed#{}", shard));
        assert_eq!(bucket.bucket_key("feed", "member-1").unwrap(), key);
        assert_eq!(bucket_key("feed", 3, "member-1"), Some(key));
    }

    #[test]
    fn test_shard_of_known_values() {
        // crc32("hello") = 0x3610a686
        assert_eq!(shard_of("hello", 2), Some(0x3610a686 % 2));
        assert_eq!(shard_of("hello", 5), Some(0x3610a686 % 5));
        assert_eq!(shard_of("hello", 0), None);
        assert_eq!(bucket_key("x", 0, "hello"), None);
    }

    #[test]
    fn test_shards_are_all_used() {
        let mut seen = HashSet::new();
        for i in 0..200 {
            seen.insert(shard_of(&format!("user:{}", i), 5).unwrap());
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_with_config() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let config = CollectionsConfig {
            meta_cache_capacity: 2,
            lock_ttl_ms: 100,
            ..CollectionsConfig::default()
        };
        let bucket = ShardedBucket::with_config(store.clone(), &config).unwrap();
        assert_eq!(bucket.cache().capacity(), 2);
        assert_eq!(bucket.lock_ttl(), Duration::from_millis(100));

        let bad = CollectionsConfig {
            meta_cache_capacity: 0,
            ..CollectionsConfig::default()
        };
        assert!(ShardedBucket::with_config(store, &bad).is_err());
    }
}
