//! Process-wide configuration
//!
//! Read once at startup and handed by reference to the component builders.
//! Missing storage credentials switch off the remote paths, missing messaging
//! credentials switch off notification; neither stops a run from completing.

use crate::error::ConfigError;
use crashsim_notify::{
    NotificationDispatcher, SlackConfig, SlackSink, DEFAULT_DASHBOARD_URL, DEFAULT_NOTIFY_TIMEOUT,
};
use crashsim_store::kv::{DynamoDbConfig, DynamoDbStore, FileKeyValueStore};
use crashsim_store::object::{S3Config, S3ObjectStore};
use crashsim_store::{
    ArtifactStore, AwsCredentials, CrashRecorder, KeyValueStore, LocalDiskStore, RetryPolicy,
    DEFAULT_RECORD_TIMEOUT, DEFAULT_STORAGE_TIMEOUT,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "crash-lens-artifacts";
pub const DEFAULT_TABLE: &str = "crash-records";
pub const DEFAULT_LOCAL_DIR: &str = "./logs";
pub const DEFAULT_DATA_DIR: &str = "./data/crashes";

/// Partition key attribute of the crash table
pub const PARTITION_KEY: &str = "crashId";

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Storage credentials; `None` disables the object store and remote table
    pub credentials: Option<AwsCredentials>,

    pub region: String,

    /// Artifact bucket
    pub bucket: String,

    /// Path-style object store endpoint (S3-compatible services)
    pub s3_endpoint: Option<String>,

    /// Crash table name
    pub table: String,

    pub dynamodb_endpoint: Option<String>,

    /// Messaging sink; `None` disables notification
    pub slack: Option<SlackConfig>,

    /// Root for artifacts written by the local fallback
    pub local_dir: PathBuf,

    /// On-disk crash table used when no storage credentials are present
    pub data_dir: PathBuf,

    /// Base of the sample link in notifications
    pub dashboard_url: String,

    /// Per-attempt deadline for artifact uploads
    pub storage_timeout: Duration,

    /// Deadline for the crash table write
    pub record_timeout: Duration,

    /// Deadline for one notification attempt
    pub notify_timeout: Duration,

    /// Remote upload retries before falling back to local disk
    pub retry: RetryPolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            s3_endpoint: None,
            table: DEFAULT_TABLE.to_string(),
            dynamodb_endpoint: None,
            slack: None,
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            record_timeout: DEFAULT_RECORD_TIMEOUT,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl SimulatorConfig {
    /// Local-only configuration with default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let credentials = match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            (Some(key_id), Some(secret)) => {
                let creds = AwsCredentials::new(key_id, secret);
                Some(match var("AWS_SESSION_TOKEN") {
                    Some(token) => creds.with_session_token(token),
                    None => creds,
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("incomplete storage credentials; remote storage disabled");
                None
            }
            (None, None) => None,
        };

        let slack = match (var("SLACK_BOT_TOKEN"), var("SLACK_CHANNEL_ID")) {
            (Some(token), Some(channel)) => Some(SlackConfig::new(token, channel)),
            (Some(_), None) => {
                tracing::warn!("SLACK_CHANNEL_ID not set; notifications disabled");
                None
            }
            _ => None,
        };

        let defaults = Self::default();
        Self {
            credentials,
            region: var("AWS_REGION")
                .or_else(|| var("AWS_DEFAULT_REGION"))
                .unwrap_or(defaults.region),
            bucket: var("S3_BUCKET_NAME").unwrap_or(defaults.bucket),
            s3_endpoint: var("S3_ENDPOINT"),
            table: var("DYNAMODB_TABLE_NAME").unwrap_or(defaults.table),
            dynamodb_endpoint: var("DYNAMODB_ENDPOINT"),
            slack,
            local_dir: var("CRASHSIM_LOCAL_DIR").map_or(defaults.local_dir, PathBuf::from),
            data_dir: var("CRASHSIM_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            dashboard_url: var("CRASHSIM_DASHBOARD_URL").unwrap_or(defaults.dashboard_url),
            ..defaults
        }
    }

    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_slack(mut self, slack: SlackConfig) -> Self {
        self.slack = Some(slack);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = dir.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_record_timeout(mut self, timeout: Duration) -> Self {
        self.record_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Artifact store: S3 first when credentials are present, always backed
    /// by the local directory
    ///
    /// # Errors
    /// [`ConfigError::ObjectStore`] for an unusable endpoint override.
    pub fn artifact_store(&self) -> Result<ArtifactStore, ConfigError> {
        let store = ArtifactStore::new(LocalDiskStore::new(&self.local_dir))
            .with_retry(self.retry)
            .with_timeout(self.storage_timeout);

        let Some(credentials) = &self.credentials else {
            return Ok(store);
        };
        let mut s3 = S3Config::new(&self.bucket, &self.region, credentials.clone());
        if let Some(endpoint) = &self.s3_endpoint {
            s3 = s3.with_endpoint(endpoint);
        }
        let remote = S3ObjectStore::new(s3, self.storage_timeout)?;
        Ok(store.with_remote(Arc::new(remote)))
    }

    /// Crash recorder: DynamoDB with credentials, the on-disk table otherwise
    ///
    /// # Errors
    /// [`ConfigError::CrashTable`] if the HTTP client cannot be built.
    pub fn crash_recorder(&self) -> Result<CrashRecorder, ConfigError> {
        let store: Arc<dyn KeyValueStore> = match &self.credentials {
            Some(credentials) => {
                let mut dynamo =
                    DynamoDbConfig::new(&self.table, &self.region, PARTITION_KEY, credentials.clone());
                if let Some(endpoint) = &self.dynamodb_endpoint {
                    dynamo = dynamo.with_endpoint(endpoint);
                }
                Arc::new(DynamoDbStore::new(dynamo, self.record_timeout)?)
            }
            None => Arc::new(FileKeyValueStore::new(&self.data_dir)),
        };
        Ok(CrashRecorder::new(store)
            .with_timeout(self.record_timeout)
            .with_retry(self.retry))
    }

    /// Notification dispatcher; disabled without messaging credentials
    ///
    /// # Errors
    /// [`ConfigError::Messaging`] if the HTTP client cannot be built.
    pub fn dispatcher(&self) -> Result<NotificationDispatcher, ConfigError> {
        let dispatcher = match &self.slack {
            Some(slack) => {
                NotificationDispatcher::new(Arc::new(SlackSink::new(slack.clone(), self.notify_timeout)?))
                    .with_max_attempts(2)
            }
            None => NotificationDispatcher::disabled(),
        };
        Ok(dispatcher
            .with_dashboard_url(&self.dashboard_url)
            .with_timeout(self.notify_timeout))
    }

    /// Which backends a run would use, without touching any of them
    #[must_use]
    pub fn backends(&self) -> BackendStatus {
        let remote = self.credentials.is_some();
        BackendStatus {
            artifact_store: if remote {
                match &self.s3_endpoint {
                    Some(endpoint) => format!("s3://{} via {endpoint}", self.bucket),
                    None => format!("s3://{} ({})", self.bucket, self.region),
                }
            } else {
                format!("local disk only ({})", self.local_dir.display())
            },
            local_fallback: self.local_dir.clone(),
            crash_table: if remote {
                format!("dynamodb table {} ({})", self.table, self.region)
            } else {
                format!("json files in {}", self.data_dir.display())
            },
            messaging: self
                .slack
                .as_ref()
                .map(|s| format!("slack channel {}", s.channel_id)),
        }
    }
}

/// Configured backends, as reported by `crashsim status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub artifact_store: String,
    pub local_fallback: PathBuf,
    pub crash_table: String,
    pub messaging: Option<String>,
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "artifact store:  {}", self.artifact_store)?;
        writeln!(f, "local fallback:  {}", self.local_fallback.display())?;
        writeln!(f, "crash table:     {}", self.crash_table)?;
        write!(
            f,
            "notifications:   {}",
            self.messaging.as_deref().unwrap_or("disabled")
        )
    }
}
