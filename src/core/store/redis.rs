//! Redis-backed store
//!
//! One synchronous connection shared behind a mutex. Batches are sent with
//! `redis::pipe()` (no `MULTI`), matching servers that reject multi-field
//! `HSET`, so a batch is one round trip but not atomic. Whole-record writes
//! that must stay consistent use a single multi-field `HSET` instead.

use super::{HashOp, Page, ScoreRange, ScoredMember, Store, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

pub struct RedisStore {
    conn: Mutex<::redis::Connection>,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/2`)
    pub fn connect(url: &str) -> StoreResult<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_connection()?;
        info!("Connected to redis at {}", url);
        Ok(RedisStore {
            conn: Mutex::new(conn),
        })
    }

    fn query<T: ::redis::FromRedisValue>(&self, cmd: &::redis::Cmd) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        Ok(cmd.query(&mut *conn)?)
    }

    fn query_pipe<T: ::redis::FromRedisValue>(&self, pipe: &::redis::Pipeline) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        Ok(pipe.query(&mut *conn)?)
    }
}

impl Store for RedisStore {
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.query(::redis::cmd("HSET").arg(key).arg(field).arg(value))
    }

    fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = ::redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        self.query(&cmd)
    }

    fn hash_batch(&self, key: &str, ops: &[HashOp]) -> StoreResult<()> {
        let mut pipe = ::redis::pipe();
        for op in ops {
            match op {
                HashOp::Set { field, value } => {
                    pipe.cmd("HSET").arg(key).arg(field).arg(value).ignore();
                }
                HashOp::IncrBy { field, delta } => {
                    pipe.cmd("HINCRBY").arg(key).arg(field).arg(*delta).ignore();
                }
            }
        }
        self.query_pipe(&pipe)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.query(::redis::cmd("HGET").arg(key).arg(field))
    }

    fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        self.query(::redis::cmd("HMGET").arg(key).arg(fields))
    }

    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.query(::redis::cmd("HGETALL").arg(key))
    }

    fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.query(::redis::cmd("HDEL").arg(key).arg(fields))
    }

    fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.query(::redis::cmd("HEXISTS").arg(key).arg(field))
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.query(::redis::cmd("HINCRBY").arg(key).arg(field).arg(delta))
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.query(::redis::cmd("ZADD").arg(key).arg(score).arg(member))
    }

    fn zrem(&self, key: &str, members: &[String]) -> StoreResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.query(::redis::cmd("ZREM").arg(key).arg(members))
    }

    fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<u64>> {
        self.query(::redis::cmd("ZRANK").arg(key).arg(member))
    }

    fn zrank_batch(&self, key: &str, members: &[String]) -> StoreResult<Vec<Option<u64>>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = ::redis::pipe();
        for m in members {
            pipe.cmd("ZRANK").arg(key).arg(m);
        }
        self.query_pipe(&pipe)
    }

    fn zcount(&self, key: &str, range: ScoreRange) -> StoreResult<u64> {
        self.query(
            ::redis::cmd("ZCOUNT")
                .arg(key)
                .arg(range.min.as_min_arg())
                .arg(range.max.as_max_arg()),
        )
    }

    fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        page: Page,
        reverse: bool,
    ) -> StoreResult<Vec<ScoredMember>> {
        let mut cmd = if reverse {
            let mut c = ::redis::cmd("ZREVRANGEBYSCORE");
            c.arg(key)
                .arg(range.max.as_max_arg())
                .arg(range.min.as_min_arg());
            c
        } else {
            let mut c = ::redis::cmd("ZRANGEBYSCORE");
            c.arg(key)
                .arg(range.min.as_min_arg())
                .arg(range.max.as_max_arg());
            c
        };
        cmd.arg("WITHSCORES");
        if !page.is_unlimited() {
            // LIMIT takes signed 64-bit arguments
            cmd.arg("LIMIT")
                .arg(page.offset.min(i64::MAX as u64))
                .arg(page.count.min(i64::MAX as u64));
        }
        let pairs: Vec<(String, f64)> = self.query(&cmd)?;
        Ok(pairs
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let n: u64 = self.query(::redis::cmd("EXISTS").arg(key))?;
        Ok(n > 0)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let reply: Option<String> = self.query(
            ::redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl.as_millis() as u64),
        )?;
        Ok(reply.is_some())
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        let n: u64 = self.query(::redis::cmd("DEL").arg(key))?;
        Ok(n > 0)
    }
}
