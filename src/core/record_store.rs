//! One record per hash key
//!
//! The whole hash at `key` is a single record: field names are the record's
//! external names, with no id prefix or presence marker.

use crate::codec::{self, FieldWarning, Record};
use crate::core::store::Store;
use crate::error::{CollectionError, Result};
use std::sync::Arc;

pub struct RecordStore {
    store: Arc<dyn Store>,
}

impl RecordStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        RecordStore { store }
    }

    /// Populate `dest` from the hash at `key`
    pub fn get_struct<R: Record>(&self, key: &str, dest: &mut R) -> Result<Vec<FieldWarning>> {
        codec::field_names::<R>()?;
        if !self.store.exists(key)? {
            return Err(CollectionError::NotFound(key.to_string()));
        }
        let values = self.store.hgetall(key)?;
        codec::populate(dest, &values)
    }

    /// Write every mappable field of `src` into the hash at `key`
    ///
    /// Fields already in the hash but not in `src`'s schema are kept.
    pub fn set_struct<R: Record>(&self, key: &str, src: &R) -> Result<()> {
        let fields: Vec<(String, String)> = codec::flatten(src)?.into_iter().collect();
        self.store.hset_multiple(key, &fields)?;
        Ok(())
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.exists(key)?)
    }
}
