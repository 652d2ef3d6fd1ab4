//! crashsim storage
//!
//! Two capability seams and the components built on them:
//!
//! - [`ObjectStore`] → [`ArtifactStore`]: remote upload with retry, falling
//!   back to [`LocalDiskStore`] so the artifact is always persisted somewhere
//! - [`KeyValueStore`] → [`CrashRecorder`]: one crash record per `crashId`,
//!   idempotent on that id
//!
//! Concrete backends: S3 and DynamoDB (SigV4-signed HTTP), an on-disk JSON
//! table, and in-memory stores for tests.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact_store;
mod error;
pub mod kv;
mod local;
pub mod object;
mod recorder;
mod retry;
mod sigv4;

pub use artifact_store::{ArtifactStore, DEFAULT_STORAGE_TIMEOUT};
pub use error::{KvError, ObjectStoreError, RecordingError, SigningError, StoreError};
pub use kv::KeyValueStore;
pub use local::LocalDiskStore;
pub use object::{ObjectStore, PutObject};
pub use recorder::{CrashRecorder, DEFAULT_RECORD_TIMEOUT};
pub use retry::{BackoffPolicy, RetryPolicy};
pub use sigv4::AwsCredentials;
