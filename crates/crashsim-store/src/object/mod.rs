//! Remote object store seam

mod memory;
mod s3;

pub use memory::{InMemoryObjectStore, StoredObject};
pub use s3::{S3Config, S3ObjectStore};

use crate::error::ObjectStoreError;
use async_trait::async_trait;
use crashsim_model::ArtifactKey;

/// One object upload
#[derive(Debug, Clone)]
pub struct PutObject<'a> {
    pub key: &'a ArtifactKey,
    pub body: &'a [u8],
    pub content_type: &'a str,
    /// Lowercase hex SHA-256 of `body`
    pub payload_sha256: String,
    /// User metadata, sent as `x-amz-meta-{name}`
    pub metadata: Vec<(&'static str, String)>,
}

/// Durable remote object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Store `request.body` under `request.key`, returning its public URL
    async fn put_object(&self, request: PutObject<'_>) -> Result<String, ObjectStoreError>;
}
