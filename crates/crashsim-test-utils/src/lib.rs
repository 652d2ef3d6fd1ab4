//! Testing utilities for the crashsim workspace
//!
//! Fault-injecting object stores, crash tables and message sinks, plus a
//! [`Fixture`] that wires in-memory backends under a temporary directory.

#![allow(missing_docs)]

use async_trait::async_trait;
use crashsim_notify::{CrashNotification, MessageSink, NotifyError};
use crashsim_store::kv::InMemoryKeyValueStore;
use crashsim_store::object::InMemoryObjectStore;
use crashsim_store::{
    ArtifactStore, CrashRecorder, KeyValueStore, KvError, LocalDiskStore, ObjectStore,
    ObjectStoreError, PutObject, RetryPolicy,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::TempDir;

/// Short deadline so stalled doubles fail fast
pub const TEST_TIMEOUT: Duration = Duration::from_millis(200);

/// How a double misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Credentials rejected (not transient)
    Auth,
    /// Connection reset (transient)
    Network,
    /// Never answers
    Hang,
}

impl Fault {
    fn object_error(self) -> ObjectStoreError {
        match self {
            Self::Auth => ObjectStoreError::Auth { status: 403 },
            Self::Network | Self::Hang => ObjectStoreError::Network("connection reset by peer".into()),
        }
    }

    fn kv_error(self) -> KvError {
        match self {
            Self::Auth => KvError::Rejected {
                status: 400,
                code: "UnrecognizedClientException".into(),
                message: "The security token included in the request is invalid".into(),
            },
            Self::Network | Self::Hang => KvError::Network("connection reset by peer".into()),
        }
    }
}

/// Object store that always fails
#[derive(Debug)]
pub struct FailingObjectStore {
    fault: Fault,
    calls: AtomicUsize,
}

impl FailingObjectStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            fault,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FailingObjectStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn put_object(&self, _request: PutObject<'_>) -> Result<String, ObjectStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Hang {
            std::future::pending::<()>().await;
        }
        Err(self.fault.object_error())
    }
}

/// Object store that fails transiently `failures` times, then succeeds
#[derive(Debug)]
pub struct FlakyObjectStore {
    inner: InMemoryObjectStore,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyObjectStore {
    pub fn new(inner: InMemoryObjectStore, failures: usize) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn put_object(&self, request: PutObject<'_>) -> Result<String, ObjectStoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ObjectStoreError::UnexpectedResponse {
                status: 503,
                body: "SlowDown".into(),
            });
        }
        self.inner.put_object(request).await
    }
}

/// Crash table that rejects or drops every write
#[derive(Debug)]
pub struct FailingKeyValueStore {
    fault: Fault,
    calls: AtomicUsize,
}

impl FailingKeyValueStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            fault,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn put(&self, _key: &str, _item: &Value) -> Result<(), KvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Hang {
            std::future::pending::<()>().await;
        }
        Err(self.fault.kv_error())
    }

    async fn get(&self, _key: &str) -> Result<Option<Value>, KvError> {
        Err(self.fault.kv_error())
    }
}

/// Sink that keeps every message it is given
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<CrashNotification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<CrashNotification> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &CrashNotification) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Sink that always fails with `error()`
pub struct FailingSink {
    error: fn() -> NotifyError,
}

impl FailingSink {
    pub fn new(error: fn() -> NotifyError) -> Self {
        Self { error }
    }

    /// `invalid_auth`, as returned for a revoked bot token
    pub fn invalid_auth() -> Self {
        Self::new(|| NotifyError::Rejected("invalid_auth".into()))
    }
}

#[async_trait]
impl MessageSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _message: &CrashNotification) -> Result<(), NotifyError> {
        Err((self.error)())
    }
}

/// In-memory backends under a temporary directory
#[derive(Debug)]
pub struct Fixture {
    pub dir: TempDir,
    pub objects: InMemoryObjectStore,
    pub table: InMemoryKeyValueStore,
}

impl Fixture {
    /// # Panics
    /// If no temporary directory can be created.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            objects: InMemoryObjectStore::new("crash-lens-test"),
            table: InMemoryKeyValueStore::new(),
        }
    }

    /// Local fallback root
    pub fn local_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Artifact store with no remote configured
    pub fn local_store(&self) -> ArtifactStore {
        ArtifactStore::new(LocalDiskStore::new(self.local_dir()))
    }

    /// Artifact store over the in-memory bucket
    pub fn remote_store(&self) -> ArtifactStore {
        self.store_with(Arc::new(self.objects.clone()))
    }

    /// Artifact store over `remote`, with fast retries and a short deadline
    pub fn store_with(&self, remote: Arc<dyn ObjectStore>) -> ArtifactStore {
        self.local_store()
            .with_remote(remote)
            .with_retry(RetryPolicy {
                max_attempts: 3,
                base_backoff_ms: 1,
            })
            .with_timeout(TEST_TIMEOUT)
    }

    /// Recorder over the in-memory table
    pub fn recorder(&self) -> CrashRecorder {
        CrashRecorder::new(Arc::new(self.table.clone())).with_timeout(TEST_TIMEOUT)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
