//! # Redis Collections - Higher-Level Collections over Hashes and Sorted Sets
//!
//! `redis-collections` layers three collection types over a store that only
//! offers hashes and sorted sets:
//!
//! - **Object hash** ([`ObjectHash`]): many records of one schema in a single
//!   hash, namespaced per id, with a presence marker and an item counter
//! - **Sharded bucket** ([`ShardedBucket`]): a named collection spread over
//!   2-5 hash keys by `crc32(member) % bucket_count`, with cached metadata and
//!   an advisory lock
//! - **Scored list** ([`ScoredList`]): a sorted set with a paging cursor over
//!   score ranges
//!
//! Records are plain structs mapped with [`impl_record!`]; the [`codec`]
//! flattens them to string field maps and populates them back, field by field.
//!
//! ## Quick Start
//!
//! ```rust
//! use redis_collections::{impl_record, MemoryStore, ObjectHash, Result};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Foo {
//!     name: String,
//!     sex: i32,
//! }
//! impl_record!(Foo { name, sex });
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let accounts = ObjectHash::new(store, "account");
//!
//! accounts.set("0", &Foo { name: "lihao".into(), sex: 1 })?;
//!
//! let mut foo = Foo::default();
//! accounts.scan(&mut foo, "0")?;
//! assert_eq!(foo.name, "lihao");
//! assert_eq!(accounts.size()?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Against Redis
//!
//! With the `redis` feature enabled, build the store from configuration:
//!
//! ```rust,ignore
//! use redis_collections::{open_store, CollectionsConfig, ShardedBucket};
//!
//! let config = CollectionsConfig::load("collections.toml")?;
//! let store = open_store(&config.store)?;
//! let buckets = ShardedBucket::with_config(store, &config)?;
//! buckets.create("feed", 3)?;
//! ```

pub mod core;
pub mod error;

pub use crate::core::codec;

pub use crate::core::{
    bucket::{bucket_key, shard_of, BucketMeta, MetaCache, ShardedBucket, MAX_BUCKET_COUNT, MIN_BUCKET_COUNT},
    codec::{FieldKind, FieldMap, FieldSpec, FieldType, FieldValue, FieldWarning, Record},
    config::{CollectionsConfig, RedisStoreConfig, StoreConfig},
    list::{ListEntry, ListIterator, Pages, ScoredList},
    object_hash::ObjectHash,
    record_store::RecordStore,
    store::{open_store, HashOp, MemoryStore, Page, ScoreBound, ScoreRange, ScoredMember, Store, StoreError},
};
pub use crate::error::{CollectionError, Result};

#[cfg(feature = "redis")]
pub use crate::core::store::RedisStore;
