//! Storage error taxonomy
//!
//! Remote object store failures never reach the caller of
//! [`ArtifactStore::persist`](crate::ArtifactStore::persist); they degrade to
//! the local path. Only a failed local write is fatal. Crash table failures
//! are reported separately through [`RecordingError`].

use crashsim_model::CrashId;
use std::path::PathBuf;
use std::time::Duration;

/// Request signing failed
#[derive(Debug, thiserror::Error)]
#[error("request signing failed: {0}")]
pub struct SigningError(#[from] hmac::digest::InvalidLength);

/// Remote object store errors
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// No response within the per-attempt deadline
    #[error("object store request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS or TLS failure
    #[error("object store network error: {0}")]
    Network(String),

    /// Credentials rejected
    #[error("object store denied access (status {status})")]
    Auth { status: u16 },

    #[error("bucket not found: {bucket}")]
    NoSuchBucket { bucket: String },

    #[error("unexpected object store response {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("invalid object store endpoint: {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl ObjectStoreError {
    /// Worth another attempt before falling back
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::UnexpectedResponse { status, .. } => *status >= 500 || *status == 429,
            Self::Auth { .. }
            | Self::NoSuchBucket { .. }
            | Self::InvalidEndpoint(_)
            | Self::Signing(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Fatal artifact persistence error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The local fallback write failed; the artifact exists nowhere
    #[error("failed to write artifact to {path}: {source}")]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key-value store errors
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("crash table request timed out after {0:?}")]
    Timeout(Duration),

    #[error("crash table network error: {0}")]
    Network(String),

    /// The table service answered with an error
    #[error("crash table rejected request ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    /// Item is not a JSON object or cannot be converted
    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("invalid key: '{0}'")]
    InvalidKey(String),

    #[error("crash table I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crash table serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl KvError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Rejected { status, code, .. } => {
                *status >= 500 || code.contains("Throttling") || code.contains("ProvisionedThroughput")
            }
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// The crash could not be tracked
///
/// Distinct from [`StoreError`]: when this is returned the artifact may well
/// exist, but no record points at it.
#[derive(Debug, thiserror::Error)]
#[error("failed to record crash {crash_id}: {source}")]
pub struct RecordingError {
    pub crash_id: CrashId,
    #[source]
    pub source: KvError,
}
