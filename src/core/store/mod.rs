//! Remote store boundary
//!
//! The collections only need a narrow slice of a Redis-like server: hashes,
//! sorted sets, and a handful of key operations. [`Store`] captures that slice
//! so collections can run against Redis ([`RedisStore`], feature `redis`) or
//! fully in-process ([`MemoryStore`]).
//!
//! All keys, fields and values are plain strings. Batched calls are pipelined
//! into one round trip but are NOT atomic across their members.

pub mod factory;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use factory::open_store;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Store operation result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Transport or protocol failures reported by a store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Operation against a key holding the wrong kind of value
    #[error("WRONGTYPE operation against key {0} holding the wrong kind of value")]
    WrongType(String),

    /// Increment on a field whose value is not an integer
    #[error("hash value is not an integer: {key}/{field}")]
    NotAnInteger { key: String, field: String },

    /// Generic backend failure
    #[error("backend failure: {0}")]
    Backend(String),

    #[cfg(feature = "redis")]
    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// One field operation inside a pipelined hash batch
#[derive(Debug, Clone, PartialEq)]
pub enum HashOp {
    /// `HSET key field value`
    Set { field: String, value: String },
    /// `HINCRBY key field delta`
    IncrBy { field: String, delta: i64 },
}

impl HashOp {
    pub fn set(field: impl Into<String>, value: impl Into<String>) -> Self {
        HashOp::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn incr_by(field: impl Into<String>, delta: i64) -> Self {
        HashOp::IncrBy {
            field: field.into(),
            delta,
        }
    }
}

/// One bound of a score range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// `-inf` on the min side, `+inf` on the max side
    Unbounded,
    /// Inclusive bound
    Inclusive(f64),
}

impl ScoreBound {
    /// Render as a `ZRANGEBYSCORE` min argument
    pub fn as_min_arg(&self) -> String {
        match self {
            ScoreBound::Unbounded => "-inf".to_string(),
            ScoreBound::Inclusive(v) => v.to_string(),
        }
    }

    /// Render as a `ZRANGEBYSCORE` max argument
    pub fn as_max_arg(&self) -> String {
        match self {
            ScoreBound::Unbounded => "+inf".to_string(),
            ScoreBound::Inclusive(v) => v.to_string(),
        }
    }

    pub(crate) fn admits_from_below(&self, score: f64) -> bool {
        match self {
            ScoreBound::Unbounded => true,
            ScoreBound::Inclusive(min) => score >= *min,
        }
    }

    pub(crate) fn admits_from_above(&self, score: f64) -> bool {
        match self {
            ScoreBound::Unbounded => true,
            ScoreBound::Inclusive(max) => score <= *max,
        }
    }
}

/// Closed score interval `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: ScoreBound,
    pub max: ScoreBound,
}

impl ScoreRange {
    pub fn new(min: ScoreBound, max: ScoreBound) -> Self {
        ScoreRange { min, max }
    }

    pub fn all() -> Self {
        ScoreRange::new(ScoreBound::Unbounded, ScoreBound::Unbounded)
    }

    pub fn contains(&self, score: f64) -> bool {
        self.min.admits_from_below(score) && self.max.admits_from_above(score)
    }
}

impl fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min.as_min_arg(), self.max.as_max_arg())
    }
}

/// Paging window for range-by-score queries (`LIMIT offset count`)
///
/// A zero `count` with a zero `offset` means no `LIMIT` clause at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub count: u64,
}

impl Page {
    pub fn new(offset: u64, count: u64) -> Self {
        Page { offset, count }
    }

    pub fn is_unlimited(&self) -> bool {
        self.offset == 0 && self.count == 0
    }
}

/// Member and score pair as returned by a sorted set
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Capabilities a backing store must provide
pub trait Store: Send + Sync {
    // Hashes

    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Set several fields in one command; readers see all of them or none
    fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    /// Pipeline several field operations against one hash in a single round trip
    fn hash_batch(&self, key: &str, ops: &[HashOp]) -> StoreResult<()>;

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Values in the same order as `fields`; absent fields are `None`
    fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>>;

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Returns the number of fields actually removed
    fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<u64>;

    fn hexists(&self, key: &str, field: &str) -> StoreResult<bool>;

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    // Sorted sets

    /// Insert or overwrite the score of `member`
    fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    fn zrem(&self, key: &str, members: &[String]) -> StoreResult<u64>;

    fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<u64>>;

    /// One `ZRANK` per member, pipelined; ranks in input order
    fn zrank_batch(&self, key: &str, members: &[String]) -> StoreResult<Vec<Option<u64>>>;

    fn zcount(&self, key: &str, range: ScoreRange) -> StoreResult<u64>;

    /// `ZRANGEBYSCORE` (or `ZREVRANGEBYSCORE` when `reverse`) with scores
    fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        page: Page,
        reverse: bool,
    ) -> StoreResult<Vec<ScoredMember>>;

    // Keys

    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// `SET key value NX PX ttl`; true if the key was set
    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Returns true if a key was removed
    fn del(&self, key: &str) -> StoreResult<bool>;
}
