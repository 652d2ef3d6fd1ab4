//! Crash table seam
//!
//! Items are JSON objects keyed by a single partition key. `put` is an
//! upsert: writing the same key twice leaves one item holding the last value.

mod dynamo;
mod file;
mod memory;

pub use dynamo::{DynamoDbConfig, DynamoDbStore};
pub use file::FileKeyValueStore;
pub use memory::InMemoryKeyValueStore;

use crate::error::KvError;
use async_trait::async_trait;
use serde_json::Value;

/// Partition-key item store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Insert or overwrite the item under `key`
    async fn put(&self, key: &str, item: &Value) -> Result<(), KvError>;

    async fn get(&self, key: &str) -> Result<Option<Value>, KvError>;
}

/// Keys become file names and URL-free request fields, so keep them plain
pub(crate) fn validate_key(key: &str) -> Result<(), KvError> {
    let ok = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(KvError::InvalidKey(key.to_string()))
    }
}
