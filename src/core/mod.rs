//! Collection implementations and the store boundary they run on

pub mod bucket;
pub mod codec;
pub mod config;
pub mod list;
pub mod object_hash;
pub mod record_store;
pub mod store;
