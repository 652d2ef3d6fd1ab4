use super::{validate_key, KeyValueStore};
use crate::error::KvError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Process-local crash table
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    items: Arc<DashMap<String, Value>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, item: &Value) -> Result<(), KvError> {
        validate_key(key)?;
        self.items.insert(key.to_string(), item.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        validate_key(key)?;
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_overwrites() {
        let store = InMemoryKeyValueStore::new();
        store.put("k", &json!({"n": 1})).await.unwrap();
        store.put("k", &json!({"n": 2})).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"n": 2})));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }
}
