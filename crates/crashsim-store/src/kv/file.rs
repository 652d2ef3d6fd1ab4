use super::{validate_key, KeyValueStore};
use crate::error::KvError;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Crash table kept as one pretty-printed JSON file per item
///
/// Used when no remote table is configured. Writes go through a temporary
/// file and a rename, so a reader never sees a half-written item.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn put(&self, key: &str, item: &Value) -> Result<(), KvError> {
        validate_key(key)?;
        if !item.is_object() {
            return Err(KvError::InvalidItem("item must be a JSON object".into()));
        }
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.item_path(key);
        let tmp = self.root.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(item)?).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        validate_key(key)?;
        match tokio::fs::read(self.item_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
