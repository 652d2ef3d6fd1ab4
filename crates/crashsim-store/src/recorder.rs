//! Crash record writes

use crate::error::{KvError, RecordingError};
use crate::kv::KeyValueStore;
use crate::retry::{BackoffPolicy, RetryPolicy};
use chrono::{DateTime, Utc};
use crashsim_model::{ArtifactLocation, CrashId, CrashRecord, ScenarioDefinition};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for one crash table write
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes one structured crash record per run, keyed by `crashId`
#[derive(Clone)]
pub struct CrashRecorder {
    store: Arc<dyn KeyValueStore>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CrashRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashRecorder")
            .field("store", &self.store.name())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl CrashRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_RECORD_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }

    /// Retry transient write failures (timeouts, throttling, 5xx)
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    /// Record a crash under a freshly minted id
    ///
    /// # Errors
    /// [`RecordingError`] if the item cannot be written.
    pub async fn record(
        &self,
        scenario: &ScenarioDefinition,
        location: &ArtifactLocation,
        users_impacted: u32,
    ) -> Result<CrashRecord, RecordingError> {
        self.record_as(CrashId::new(), scenario, location, users_impacted)
            .await
    }

    /// Record a crash under a caller-supplied id
    ///
    /// Idempotent on `crash_id`: repeating the call overwrites the one record.
    /// An existing record keeps its `createdAt`; only `updatedAt` moves.
    ///
    /// # Errors
    /// [`RecordingError`] if the item cannot be written.
    pub async fn record_as(
        &self,
        crash_id: CrashId,
        scenario: &ScenarioDefinition,
        location: &ArtifactLocation,
        users_impacted: u32,
    ) -> Result<CrashRecord, RecordingError> {
        let mut record = CrashRecord::new(crash_id, scenario, location, users_impacted, Utc::now());
        if let Some(created_at) = self.existing_created_at(crash_id).await {
            record.created_at = created_at;
        }
        let fail = |source| RecordingError { crash_id, source };

        let item = serde_json::to_value(&record).map_err(|e| fail(KvError::from(e)))?;
        let key = crash_id.to_string();
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.store.put(&key, &item)).await {
                Ok(result) => result,
                Err(_) => Err(KvError::Timeout(self.timeout)),
            };
            match result {
                Ok(()) => break,
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(%crash_id, attempt, ?delay, error = %e, "transient crash table failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(fail(e)),
            }
        }

        tracing::info!(
            %crash_id,
            scenario = %record.scenario,
            backend = self.store.name(),
            severity = %record.severity(),
            users_impacted,
            attempts = attempt,
            "crash recorded"
        );
        Ok(record)
    }

    async fn existing_created_at(&self, crash_id: CrashId) -> Option<DateTime<Utc>> {
        match self.fetch(crash_id).await {
            Ok(existing) => existing.map(|r| r.created_at),
            Err(e) => {
                tracing::debug!(%crash_id, error = %e.source, "no prior record read; writing fresh");
                None
            }
        }
    }

    /// Read a record back
    ///
    /// # Errors
    /// [`RecordingError`] if the table cannot be read or the item does not
    /// deserialize.
    pub async fn fetch(&self, crash_id: CrashId) -> Result<Option<CrashRecord>, RecordingError> {
        let fail = |source| RecordingError { crash_id, source };
        let item = match tokio::time::timeout(self.timeout, self.store.get(&crash_id.to_string())).await {
            Ok(result) => result.map_err(fail)?,
            Err(_) => return Err(fail(KvError::Timeout(self.timeout))),
        };
        item.map(|value| serde_json::from_value(value).map_err(|e| fail(KvError::from(e))))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileKeyValueStore, InMemoryKeyValueStore};
    use async_trait::async_trait;
    use crashsim_model::{ArtifactKey, ScenarioKind, Severity};
    use crashsim_scenario::ScenarioCatalog;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scenario() -> Arc<ScenarioDefinition> {
        ScenarioCatalog::builtin()
            .get(ScenarioKind::PaystackTimeout)
            .unwrap()
    }

    fn location(id: &CrashId) -> ArtifactLocation {
        ArtifactLocation::remote(
            ArtifactKey::for_run(id),
            format!("https://b.s3.us-east-1.amazonaws.com/{id}/error/{id}.log"),
        )
    }

    #[tokio::test]
    async fn record_mints_distinct_ids() {
        let recorder = CrashRecorder::new(Arc::new(InMemoryKeyValueStore::new()));
        let id = CrashId::new();
        let a = recorder.record(&scenario(), &location(&id), 10).await.unwrap();
        let b = recorder.record(&scenario(), &location(&id), 10).await.unwrap();
        assert_ne!(a.crash_id, b.crash_id);
    }

    #[tokio::test]
    async fn same_crash_id_overwrites() {
        let table = Arc::new(InMemoryKeyValueStore::new());
        let recorder = CrashRecorder::new(table.clone());
        let id = CrashId::new();

        recorder.record_as(id, &scenario(), &location(&id), 10).await.unwrap();
        recorder.record_as(id, &scenario(), &location(&id), 99).await.unwrap();

        assert_eq!(table.len(), 1);
        let stored = recorder.fetch(id).await.unwrap().unwrap();
        assert_eq!(stored.users_impacted, 99);
    }

    #[tokio::test]
    async fn record_snapshots_catalog_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(Arc::new(FileKeyValueStore::new(dir.path())));
        let id = CrashId::new();

        let record = recorder.record_as(id, &scenario(), &location(&id), 1234).await.unwrap();
        assert_eq!(record.severity(), Severity::Critical);
        assert_eq!(record.error_details.component, "PAYMENT_SERVICE");
        assert_eq!(record.s3_key, format!("{id}/error/{id}.log"));

        let raw: Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(format!("{id}.json"))).unwrap())
                .unwrap();
        assert_eq!(raw["crashId"], id.to_string());
        assert_eq!(raw["errorDetails"]["errorType"], "httpx.ConnectTimeout");
        assert_eq!(recorder.fetch(id).await.unwrap(), Some(record));
    }

    struct Broken;

    #[async_trait]
    impl KeyValueStore for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn put(&self, _key: &str, _item: &Value) -> Result<(), KvError> {
            Err(KvError::Rejected {
                status: 400,
                code: "ResourceNotFoundException".into(),
                message: "Requested resource not found".into(),
            })
        }

        async fn get(&self, _key: &str) -> Result<Option<Value>, KvError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn write_failure_is_a_recording_error() {
        let recorder = CrashRecorder::new(Arc::new(Broken));
        let id = CrashId::new();
        let err = recorder
            .record_as(id, &scenario(), &location(&id), 1)
            .await
            .unwrap_err();
        assert_eq!(err.crash_id, id);
        assert!(matches!(err.source, KvError::Rejected { .. }));
    }

    struct Hung;

    #[async_trait]
    impl KeyValueStore for Hung {
        fn name(&self) -> &'static str {
            "hung"
        }

        async fn put(&self, _key: &str, _item: &Value) -> Result<(), KvError> {
            std::future::pending().await
        }

        async fn get(&self, _key: &str) -> Result<Option<Value>, KvError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_table_times_out() {
        let recorder =
            CrashRecorder::new(Arc::new(Hung)).with_timeout(Duration::from_millis(20));
        let id = CrashId::new();
        let err = recorder
            .record_as(id, &scenario(), &location(&id), 1)
            .await
            .unwrap_err();
        assert!(matches!(err.source, KvError::Timeout(_)));
    }

    #[tokio::test]
    async fn rerecord_keeps_created_at() {
        let table = Arc::new(InMemoryKeyValueStore::new());
        let recorder = CrashRecorder::new(table.clone());
        let id = CrashId::new();

        let first = recorder.record_as(id, &scenario(), &location(&id), 10).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = recorder.record_as(id, &scenario(), &location(&id), 20).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        let stored = recorder.fetch(id).await.unwrap().unwrap();
        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(stored.updated_at, second.updated_at);
    }

    /// Throttles the first `failures` writes, then stores
    struct Throttled {
        inner: InMemoryKeyValueStore,
        failures: usize,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for Throttled {
        fn name(&self) -> &'static str {
            "throttled"
        }

        async fn put(&self, key: &str, item: &Value) -> Result<(), KvError> {
            if self.puts.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(KvError::Rejected {
                    status: 400,
                    code: "ThrottlingException".into(),
                    message: "Rate exceeded".into(),
                });
            }
            self.inner.put(key, item).await
        }

        async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
            self.inner.get(key).await
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn throttled_writes_are_retried() {
        let table = Arc::new(Throttled {
            inner: InMemoryKeyValueStore::new(),
            failures: 2,
            puts: AtomicUsize::new(0),
        });
        let recorder = CrashRecorder::new(table.clone()).with_retry(fast_retry());
        let id = CrashId::new();

        recorder.record_as(id, &scenario(), &location(&id), 1).await.unwrap();
        assert_eq!(table.puts.load(Ordering::SeqCst), 3);
        assert_eq!(table.inner.len(), 1);
    }

    #[tokio::test]
    async fn retries_stop_at_the_attempt_limit() {
        let table = Arc::new(Throttled {
            inner: InMemoryKeyValueStore::new(),
            failures: usize::MAX,
            puts: AtomicUsize::new(0),
        });
        let recorder = CrashRecorder::new(table.clone()).with_retry(fast_retry());
        let id = CrashId::new();

        let err = recorder
            .record_as(id, &scenario(), &location(&id), 1)
            .await
            .unwrap_err();
        assert!(err.source.is_transient());
        assert_eq!(table.puts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejected_writes_are_not_retried() {
        let recorder = CrashRecorder::new(Arc::new(Broken)).with_retry(fast_retry());
        let id = CrashId::new();
        let err = recorder
            .record_as(id, &scenario(), &location(&id), 1)
            .await
            .unwrap_err();
        assert!(!err.source.is_transient());
    }
}
