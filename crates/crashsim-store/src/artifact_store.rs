//! Artifact persistence with local fallback
//!
//! The artifact always ends up somewhere and the caller is told where. A
//! remote failure of any kind (auth, network, missing bucket, timeout) is
//! retried if transient and then degrades to a local write of the same bytes
//! under the same key. Only a failed local write is an error.

use crate::error::{ObjectStoreError, StoreError};
use crate::local::LocalDiskStore;
use crate::object::{ObjectStore, PutObject};
use crate::retry::{BackoffPolicy, RetryPolicy};
use crashsim_model::{ArtifactKey, ArtifactLocation, CrashArtifact};
use std::sync::Arc;
use std::time::Duration;

/// Default per-attempt deadline for remote uploads
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Durable-storage client for crash artifacts
#[derive(Clone)]
pub struct ArtifactStore {
    remote: Option<Arc<dyn ObjectStore>>,
    local: LocalDiskStore,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("local", &self.local)
            .field("retry", &self.retry)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl ArtifactStore {
    /// Local-only store; [`with_remote`](Self::with_remote) adds the primary path
    pub fn new(local: LocalDiskStore) -> Self {
        Self {
            remote: None,
            local,
            retry: RetryPolicy::default(),
            attempt_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn ObjectStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    #[must_use]
    pub fn local(&self) -> &LocalDiskStore {
        &self.local
    }

    /// Persist `artifact` under `key`
    ///
    /// Without a configured remote this goes straight to local disk.
    ///
    /// # Errors
    /// [`StoreError::LocalWrite`] if the local write fails; remote errors are
    /// never returned.
    pub async fn persist(
        &self,
        artifact: &CrashArtifact,
        key: &ArtifactKey,
    ) -> Result<ArtifactLocation, StoreError> {
        if let Some(remote) = &self.remote {
            match self.upload(remote.as_ref(), artifact, key).await {
                Ok(url) => {
                    tracing::info!(
                        crash_id = %artifact.crash_id(),
                        backend = remote.name(),
                        %key,
                        bytes = artifact.len(),
                        "artifact persisted remotely"
                    );
                    return Ok(ArtifactLocation::remote(key.clone(), url));
                }
                Err(e) => {
                    tracing::warn!(
                        crash_id = %artifact.crash_id(),
                        backend = remote.name(),
                        error = %e,
                        "remote upload failed; falling back to local disk"
                    );
                }
            }
        } else {
            tracing::debug!(crash_id = %artifact.crash_id(), "no remote object store configured");
        }

        let path = self
            .local
            .write(key, artifact.bytes())
            .await
            .map_err(|source| StoreError::LocalWrite {
                path: self.local.path_for(key),
                source,
            })?;
        tracing::info!(
            crash_id = %artifact.crash_id(),
            path = %path.display(),
            bytes = artifact.len(),
            "artifact persisted to local disk"
        );
        Ok(ArtifactLocation::local(key.clone(), path))
    }

    async fn upload(
        &self,
        remote: &dyn ObjectStore,
        artifact: &CrashArtifact,
        key: &ArtifactKey,
    ) -> Result<String, ObjectStoreError> {
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            let request = PutObject {
                key,
                body: artifact.bytes(),
                content_type: artifact.format().content_type(),
                payload_sha256: artifact.digest().to_hex(),
                metadata: vec![
                    ("scenario", artifact.scenario().to_string()),
                    ("crash-id", artifact.crash_id().to_string()),
                ],
            };

            let result = match tokio::time::timeout(self.attempt_timeout, remote.put_object(request)).await {
                Ok(result) => result,
                Err(_) => Err(ObjectStoreError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(url) => return Ok(url),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "transient upload failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::InMemoryObjectStore;
    use async_trait::async_trait;
    use crashsim_model::{CrashId, LogFormat, ScenarioKind, StorageBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn artifact() -> CrashArtifact {
        CrashArtifact::new(
            CrashId::new(),
            ScenarioKind::PaystackTimeout,
            LogFormat::Plain,
            Vec::new(),
            "httpx.ConnectTimeout: boom".into(),
            b"line\nhttpx.ConnectTimeout: boom\n".to_vec(),
        )
    }

    struct Flaky {
        failures: usize,
        error: fn() -> ObjectStoreError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn put_object(&self, request: PutObject<'_>) -> Result<String, ObjectStoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(format!("https://example/{}", request.key))
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn remote_success_reports_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(InMemoryObjectStore::new("bucket"));
        let store = ArtifactStore::new(LocalDiskStore::new(dir.path())).with_remote(remote.clone());
        let artifact = artifact();
        let key = ArtifactKey::for_run(&artifact.crash_id());

        let location = store.persist(&artifact, &key).await.unwrap();
        assert_eq!(location.backend, StorageBackend::RemoteObjectStore);
        assert_eq!(location.public_url.as_deref(), Some(format!("memory://bucket/{key}").as_str()));

        let stored = remote.get(key.as_str()).unwrap();
        assert_eq!(stored.body, artifact.bytes());
        assert_eq!(stored.content_type, "text/plain; charset=utf-8");
        assert!(stored
            .metadata
            .contains(&("crash-id".to_string(), artifact.crash_id().to_string())));
        // nothing on disk
        assert!(!store.local().path_for(&key).exists());
    }

    #[tokio::test]
    async fn no_remote_goes_straight_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(LocalDiskStore::new(dir.path()));
        let artifact = artifact();
        let key = ArtifactKey::for_run(&artifact.crash_id());

        let location = store.persist(&artifact, &key).await.unwrap();
        assert_eq!(location.backend, StorageBackend::LocalDisk);
        let path = location.path.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(Flaky {
            failures: 2,
            error: || ObjectStoreError::Network("reset".into()),
            calls: AtomicUsize::new(0),
        });
        let store = ArtifactStore::new(LocalDiskStore::new(dir.path()))
            .with_remote(remote.clone())
            .with_retry(fast_retry());
        let artifact = artifact();
        let key = ArtifactKey::for_run(&artifact.crash_id());

        let location = store.persist(&artifact, &key).await.unwrap();
        assert!(location.is_remote());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failure_falls_back_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(Flaky {
            failures: usize::MAX,
            error: || ObjectStoreError::Auth { status: 403 },
            calls: AtomicUsize::new(0),
        });
        let store = ArtifactStore::new(LocalDiskStore::new(dir.path()))
            .with_remote(remote.clone())
            .with_retry(fast_retry());
        let artifact = artifact();
        let key = ArtifactKey::for_run(&artifact.crash_id());

        let location = store.persist(&artifact, &key).await.unwrap();
        assert_eq!(location.backend, StorageBackend::LocalDisk);
        assert!(location.public_url.is_none());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    struct Stalled;

    #[async_trait]
    impl ObjectStore for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn put_object(&self, _request: PutObject<'_>) -> Result<String, ObjectStoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_remote_times_out_then_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(LocalDiskStore::new(dir.path()))
            .with_remote(Arc::new(Stalled))
            .with_retry(RetryPolicy::none())
            .with_timeout(Duration::from_millis(20));
        let artifact = artifact();
        let key = ArtifactKey::for_run(&artifact.crash_id());

        let location = store.persist(&artifact, &key).await.unwrap();
        assert_eq!(location.backend, StorageBackend::LocalDisk);
    }

    #[tokio::test]
    async fn failed_local_write_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let store = ArtifactStore::new(LocalDiskStore::new(&blocker));
        let artifact = artifact();
        let key = ArtifactKey::for_run(&artifact.crash_id());

        let err = store.persist(&artifact, &key).await.unwrap_err();
        assert!(matches!(err, StoreError::LocalWrite { .. }));
    }
}
