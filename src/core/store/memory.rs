//! In-process store with Redis hash and sorted-set semantics
//!
//! Used for tests, embedded use, and as the `InMemory` backend of the store
//! factory. Mirrors the server behaviour the collections rely on:
//! - empty hashes and sorted sets disappear
//! - wrong-type access fails with [`StoreError::WrongType`]
//! - keys set with a TTL expire lazily on next access
//! - sorted sets order by score, then by member bytes

use super::{HashOp, Page, ScoreRange, ScoredMember, Store, StoreError, StoreResult};
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    ZSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn persistent(value: Value) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    /// Drop `key` if its TTL has passed, then return it
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn hash(&mut self, key: &str) -> StoreResult<Option<&mut HashMap<String, String>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => Ok(Some(h)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn hash_or_create(&mut self, key: &str) -> StoreResult<&mut HashMap<String, String>> {
        if self.hash(key)?.is_none() {
            self.entries
                .insert(key.to_string(), Entry::persistent(Value::Hash(HashMap::new())));
        }
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => Ok(h),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn zset(&mut self, key: &str) -> StoreResult<Option<&mut HashMap<String, f64>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::ZSet(z),
                ..
            }) => Ok(Some(z)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn zset_or_create(&mut self, key: &str) -> StoreResult<&mut HashMap<String, f64>> {
        if self.zset(key)?.is_none() {
            self.entries
                .insert(key.to_string(), Entry::persistent(Value::ZSet(HashMap::new())));
        }
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Value::ZSet(z),
                ..
            }) => Ok(z),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    /// Remove containers that became empty
    fn prune(&mut self, key: &str) {
        let empty = match self.entries.get(key).map(|e| &e.value) {
            Some(Value::Hash(h)) => h.is_empty(),
            Some(Value::ZSet(z)) => z.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }

    fn hincrby(&mut self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let hash = self.hash_or_create(key)?;
        let current = match hash.get(field) {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::NotAnInteger {
                key: key.to_string(),
                field: field.to_string(),
            })?,
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::Backend("increment or decrement would overflow".to_string())
        })?;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }
}

fn ascending(a: &(&String, &f64), b: &(&String, &f64)) -> CmpOrdering {
    a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0))
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    round_trips: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls served so far (a batch counts once)
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        let now = Instant::now();
        let ks = self.keyspace.lock();
        ks.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    fn call(&self) -> parking_lot::MutexGuard<'_, Keyspace> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.keyspace.lock()
    }
}

impl Store for MemoryStore {
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut ks = self.call();
        ks.hash_or_create(key)?
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut ks = self.call();
        if fields.is_empty() {
            return Ok(());
        }
        let hash = ks.hash_or_create(key)?;
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn hash_batch(&self, key: &str, ops: &[HashOp]) -> StoreResult<()> {
        let mut ks = self.call();
        // Pipelined commands run one by one; an earlier failure does not undo later ones
        let mut first_err = None;
        for op in ops {
            let res = match op {
                HashOp::Set { field, value } => ks
                    .hash_or_create(key)
                    .map(|h| {
                        h.insert(field.clone(), value.clone());
                    }),
                HashOp::IncrBy { field, delta } => ks.hincrby(key, field, *delta).map(|_| ()),
            };
            if let Err(e) = res {
                first_err.get_or_insert(e);
            }
        }
        ks.prune(key);
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut ks = self.call();
        Ok(ks.hash(key)?.and_then(|h| h.get(field).cloned()))
    }

    fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>> {
        let mut ks = self.call();
        let hash = ks.hash(key)?;
        Ok(match hash {
            Some(h) => fields.iter().map(|f| h.get(f).cloned()).collect(),
            None => vec![None; fields.len()],
        })
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut ks = self.call();
        Ok(ks.hash(key)?.map(|h| h.clone()).unwrap_or_default())
    }

    fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<u64> {
        let mut ks = self.call();
        let removed = match ks.hash(key)? {
            Some(h) => fields.iter().filter(|f| h.remove(*f).is_some()).count() as u64,
            None => 0,
        };
        ks.prune(key);
        Ok(removed)
    }

    fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        let mut ks = self.call();
        Ok(ks.hash(key)?.is_some_and(|h| h.contains_key(field)))
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut ks = self.call();
        let res = ks.hincrby(key, field, delta);
        ks.prune(key);
        res
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut ks = self.call();
        ks.zset_or_create(key)?.insert(member.to_string(), score);
        Ok(())
    }

    fn zrem(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        let mut ks = self.call();
        let removed = match ks.zset(key)? {
            Some(z) => members.iter().filter(|m| z.remove(*m).is_some()).count() as u64,
            None => 0,
        };
        ks.prune(key);
        Ok(removed)
    }

    fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<u64>> {
        let mut ks = self.call();
        Ok(ks.zset(key)?.and_then(|z| rank_of(z, member)))
    }

    fn zrank_batch(&self, key: &str, members: &[String]) -> StoreResult<Vec<Option<u64>>> {
        let mut ks = self.call();
        Ok(match ks.zset(key)? {
            Some(z) => members.iter().map(|m| rank_of(z, m)).collect(),
            None => vec![None; members.len()],
        })
    }

    fn zcount(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        let mut ks = self.call();
        Ok(ks
            .zset(key)?
            .map(|z| z.values().filter(|s| range.contains(**s)).count() as u64)
            .unwrap_or(0))
    }

    fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        page: Page,
        reverse: bool,
    ) -> StoreResult<Vec<ScoredMember>> {
        let mut ks = self.call();
        let Some(z) = ks.zset(key)? else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<(&String, &f64)> =
            z.iter().filter(|(_, s)| range.contains(**s)).collect();
        matching.sort_by(ascending);
        if reverse {
            matching.reverse();
        }
        let skipped = matching.into_iter().skip(page.offset as usize);
        let selected: Vec<(&String, &f64)> = if page.is_unlimited() {
            skipped.collect()
        } else {
            skipped.take(page.count as usize).collect()
        };
        Ok(selected
            .into_iter()
            .map(|(m, s)| ScoredMember {
                member: m.clone(),
                score: *s,
            })
            .collect())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut ks = self.call();
        Ok(ks.live(key).is_some())
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut ks = self.call();
        if ks.live(key).is_some() {
            return Ok(false);
        }
        ks.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        let mut ks = self.call();
        let existed = ks.live(key).is_some();
        ks.entries.remove(key);
        Ok(existed)
    }
}

fn rank_of(z: &HashMap<String, f64>, member: &str) -> Option<u64> {
    let (member, score) = z.get_key_value(member)?;
    let ahead = z
        .iter()
        .filter(|(m, s)| ascending(&(*m, *s), &(member, score)) == CmpOrdering::Less)
        .count();
    Some(ahead as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::ScoreBound;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hash_basic() {
        let store = MemoryStore::new();
        store.hset("h", "a", "1").unwrap();
        assert_eq!(store.hget("h", "a").unwrap(), Some("1".to_string()));
        assert_eq!(store.hget("h", "b").unwrap(), None);
        assert!(store.hexists("h", "a").unwrap());
        assert_eq!(
            store.hmget("h", &fields(&["a", "b"])).unwrap(),
            vec![Some("1".to_string()), None]
        );
        assert_eq!(store.hdel("h", &fields(&["a", "b"])).unwrap(), 1);
        // Empty hashes vanish
        assert!(!store.exists("h").unwrap());
    }

    #[test]
    fn test_hincrby() {
        let store = MemoryStore::new();
        assert_eq!(store.hincrby("h", "n", 5).unwrap(), 5);
        assert_eq!(store.hincrby("h", "n", -7).unwrap(), -2);
        store.hset("h", "s", "abc").unwrap();
        assert!(matches!(
            store.hincrby("h", "s", 1),
            Err(StoreError::NotAnInteger { .. })
        ));
    }

    #[test]
    fn test_wrong_type() {
        let store = MemoryStore::new();
        store.zadd("z", "a", 1.0).unwrap();
        assert!(matches!(store.hget("z", "a"), Err(StoreError::WrongType(_))));
        store.hset("h", "a", "1").unwrap();
        assert!(matches!(store.zrank("h", "a"), Err(StoreError::WrongType(_))));
    }

    #[test]
    fn test_hash_batch_counts_one_round_trip() {
        let store = MemoryStore::new();
        let before = store.round_trips();
        store
            .hash_batch(
                "h",
                &[HashOp::set("a", "x"), HashOp::incr_by("n", 3), HashOp::set("b", "y")],
            )
            .unwrap();
        assert_eq!(store.round_trips() - before, 1);
        assert_eq!(store.hgetall("h").unwrap().len(), 3);
    }

    #[test]
    fn test_hset_multiple() {
        let store = MemoryStore::new();
        let before = store.round_trips();
        store
            .hset_multiple(
                "h",
                &[("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())],
            )
            .unwrap();
        assert_eq!(store.round_trips() - before, 1);
        assert_eq!(store.hgetall("h").unwrap().len(), 2);

        store.hset_multiple("empty", &[]).unwrap();
        assert!(!store.exists("empty").unwrap());

        store.zadd("z", "a", 1.0).unwrap();
        assert!(matches!(
            store.hset_multiple("z", &[("a".to_string(), "1".to_string())]),
            Err(StoreError::WrongType(_))
        ));
    }

    #[test]
    fn test_zset_ordering_and_rank() {
        let store = MemoryStore::new();
        store.zadd("z", "c", 30.0).unwrap();
        store.zadd("z", "a", 10.0).unwrap();
        store.zadd("z", "b", 10.0).unwrap();
        assert_eq!(store.zrank("z", "a").unwrap(), Some(0));
        assert_eq!(store.zrank("z", "b").unwrap(), Some(1));
        assert_eq!(store.zrank("z", "c").unwrap(), Some(2));
        assert_eq!(store.zrank("z", "nope").unwrap(), None);

        // Overwrite moves the member
        store.zadd("z", "a", 40.0).unwrap();
        assert_eq!(store.zrank("z", "a").unwrap(), Some(2));
    }

    #[test]
    fn test_zrange_by_score_paging() {
        let store = MemoryStore::new();
        for (m, s) in [("a", 10.0), ("b", 20.0), ("c", 30.0), ("d", 40.0)] {
            store.zadd("z", m, s).unwrap();
        }
        let range = ScoreRange::new(ScoreBound::Inclusive(20.0), ScoreBound::Unbounded);
        assert_eq!(store.zcount("z", range).unwrap(), 3);

        let page = store.zrange_by_score("z", range, Page::new(1, 5), false).unwrap();
        let members: Vec<_> = page.iter().map(|m| m.member.as_str()).collect();
        assert_eq!(members, vec!["c", "d"]);

        let rev = store
            .zrange_by_score("z", ScoreRange::all(), Page::new(0, 2), true)
            .unwrap();
        let members: Vec<_> = rev.iter().map(|m| m.member.as_str()).collect();
        assert_eq!(members, vec!["d", "c"]);

        let all = store
            .zrange_by_score("z", ScoreRange::all(), Page::new(0, 0), false)
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_set_nx_ex_expires() {
        let store = MemoryStore::new();
        assert!(store.set_nx_ex("k", "1", Duration::from_millis(50)).unwrap());
        assert!(!store.set_nx_ex("k", "1", Duration::from_millis(50)).unwrap());
        std::thread::sleep(Duration::from_millis(80));
        assert!(!store.exists("k").unwrap());
        assert!(store.set_nx_ex("k", "1", Duration::from_millis(50)).unwrap());
        assert!(store.del("k").unwrap());
        assert!(!store.del("k").unwrap());
    }
}
