//! Error types for collection operations

use crate::core::store::StoreError;
use thiserror::Error;

/// Collection operation result type
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Collection operation errors
#[derive(Error, Debug)]
pub enum CollectionError {
    /// The type has no field schema to map (nothing to flatten or populate)
    #[error("Not a record: type {0} declares no mappable fields")]
    NotARecord(&'static str),

    /// Record schema and stored fields disagree
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Record id or collection does not exist
    #[error("Key does not exist: {0}")]
    NotFound(String),

    /// Collection was already created
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    #[error("Bucket count {requested} too high (max {max})")]
    BucketCountTooHigh { requested: u32, max: u32 },

    #[error("Bucket count {requested} too low (min {min})")]
    BucketCountTooLow { requested: u32, min: u32 },

    /// Advisory lock is held by someone else
    #[error("Collection locked: {0}")]
    LockHeld(String),

    /// Cursor reached the snapshot count taken at construction
    #[error("End of list")]
    IteratorExhausted,

    /// Underlying store failure, surfaced verbatim
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CollectionError {
    fn from(err: toml::de::Error) -> Self {
        CollectionError::Config(err.to_string())
    }
}
