//! Object hash: many records of one schema inside a single hash key
//!
//! Layout inside the hash at `key`:
//! - `<id>#<field>`: one entry per mappable record field
//! - `<id>$$object`: presence marker, holds the id
//! - `<key>$$index`: number of materialized ids
//!
//! The presence marker is the only existence check; data fields alone never
//! make an id visible.
//!
//! Writes that touch several fields are pipelined as individual `HSET`s.
//! They are not atomic: two concurrent `set` calls for the same id can leave
//! a mix of both records' fields.

use crate::codec::{self, FieldMap, FieldValue, FieldWarning, Record};
use crate::core::store::{HashOp, Store};
use crate::error::{CollectionError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const INDEX_SUFFIX: &str = "$$index";
const OBJECT_SUFFIX: &str = "$$object";

/// Records of one schema stored under a single hash key
pub struct ObjectHash {
    store: Arc<dyn Store>,
    key: String,
}

impl ObjectHash {
    pub fn new(store: Arc<dyn Store>, key: impl Into<String>) -> Self {
        ObjectHash {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn index_field(&self) -> String {
        format!("{}{}", self.key, INDEX_SUFFIX)
    }

    fn object_field(id: &str) -> String {
        format!("{}{}", id, OBJECT_SUFFIX)
    }

    fn field_key(id: &str, field: &str) -> String {
        format!("{}#{}", id, field)
    }

    /// Number of materialized ids; 0 if nothing was ever stored
    pub fn size(&self) -> Result<i64> {
        let raw = self.store.hget(&self.key, &self.index_field())?;
        match raw {
            None => Ok(0),
            Some(s) => s.parse::<i64>().map_err(|_| {
                CollectionError::SchemaMismatch(format!(
                    "count field {} of {} holds {:?}",
                    self.index_field(),
                    self.key,
                    s
                ))
            }),
        }
    }

    /// Write every mappable field of `record` under `id`
    ///
    /// Counts the id if it was not present before.
    pub fn set<R: Record>(&self, id: &str, record: &R) -> Result<()> {
        let existed = self.contains(id)?;
        let fields = codec::flatten(record)?;

        let mut ops = Vec::with_capacity(fields.len() + 1);
        ops.push(HashOp::set(Self::object_field(id), id));
        for (name, value) in fields {
            ops.push(HashOp::set(Self::field_key(id, &name), value));
        }
        self.store.hash_batch(&self.key, &ops)?;

        if !existed {
            self.store.hincrby(&self.key, &self.index_field(), 1)?;
        }
        debug!("{}: set {} ({} fields, new={})", self.key, id, ops.len() - 1, !existed);
        Ok(())
    }

    /// Write one field; also materializes `id` if it was absent
    ///
    /// A field-only write does not change [`ObjectHash::size`].
    pub fn set_field(&self, id: &str, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = codec::encode(&value.into());
        self.store.hash_batch(
            &self.key,
            &[
                HashOp::set(Self::field_key(id, field), value),
                HashOp::set(Self::object_field(id), id),
            ],
        )?;
        Ok(())
    }

    /// Add `delta` to an integer field; also materializes `id`
    pub fn incr(&self, id: &str, field: &str, delta: i64) -> Result<()> {
        self.store.hash_batch(
            &self.key,
            &[
                HashOp::set(Self::object_field(id), id),
                HashOp::incr_by(Self::field_key(id, field), delta),
            ],
        )?;
        Ok(())
    }

    /// Raw stored text of one field
    pub fn get_field(&self, id: &str, field: &str) -> Result<String> {
        if !self.contains(id)? {
            return Err(CollectionError::NotFound(id.to_string()));
        }
        let field_key = Self::field_key(id, field);
        self.store
            .hget(&self.key, &field_key)?
            .ok_or(CollectionError::NotFound(field_key))
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.store.hexists(&self.key, &Self::object_field(id))?)
    }

    /// Populate `record` from the fields stored under `id`
    pub fn scan<R: Record>(&self, record: &mut R, id: &str) -> Result<Vec<FieldWarning>> {
        let names = codec::field_names::<R>()?;
        if !self.contains(id)? {
            return Err(CollectionError::NotFound(id.to_string()));
        }
        let map = self.read_fields(id, &names)?;
        codec::populate(record, &map)
    }

    /// Fetch several records, silently skipping ids that are not present
    ///
    /// Decode warnings are logged by the codec and dropped; use
    /// [`ObjectHash::range_with_warnings`] to keep them.
    pub fn range<R, I, S>(&self, ids: I) -> Result<HashMap<String, R>>
    where
        R: Record + Default,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self
            .range_with_warnings(ids)?
            .into_iter()
            .map(|(id, (record, _))| (id, record))
            .collect())
    }

    /// Like [`ObjectHash::range`], with each record's decode warnings
    pub fn range_with_warnings<R, I, S>(
        &self,
        ids: I,
    ) -> Result<HashMap<String, (R, Vec<FieldWarning>)>>
    where
        R: Record + Default,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = codec::field_names::<R>()?;
        let mut out = HashMap::new();
        for id in ids {
            let id = id.as_ref();
            if !self.contains(id)? {
                continue;
            }
            let map = self.read_fields(id, &names)?;
            let mut record = R::default();
            let warnings = codec::populate(&mut record, &map)?;
            out.insert(id.to_string(), (record, warnings));
        }
        Ok(out)
    }

    /// Remove records of schema `R`
    ///
    /// For each present id the count is decremented first, then the fields and
    /// presence marker are deleted. A failure between the two steps leaves the
    /// count one lower than the number of live ids. Absent ids are skipped.
    pub fn del<R, I, S>(&self, ids: I) -> Result<()>
    where
        R: Record,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = codec::field_names::<R>()?;
        for id in ids {
            let id = id.as_ref();
            if !self.contains(id)? {
                continue;
            }
            let mut fields: Vec<String> =
                names.iter().map(|n| Self::field_key(id, n)).collect();
            fields.push(Self::object_field(id));

            self.store.hincrby(&self.key, &self.index_field(), -1)?;
            self.store.hdel(&self.key, &fields)?;
            debug!("{}: deleted {}", self.key, id);
        }
        Ok(())
    }

    fn read_fields(&self, id: &str, names: &[&'static str]) -> Result<FieldMap> {
        let hash_fields: Vec<String> = names.iter().map(|n| Self::field_key(id, n)).collect();
        let values = self.store.hmget(&self.key, &hash_fields)?;
        if values.len() != names.len() {
            return Err(CollectionError::SchemaMismatch(format!(
                "asked for {} fields of {}, got {}",
                names.len(),
                id,
                values.len()
            )));
        }
        Ok(names
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect())
    }
}
