//! Synthesized log entries and the crash artifact they form

use crate::ids::CrashId;
use crate::scenario::{LogLevel, ScenarioKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// RFC 3339 with millisecond precision and a `Z` suffix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Line encoding of a run; every line of one artifact shares it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `{ts} {SERVICE} {LEVEL} {message}` followed by the raw traceback
    Plain,
    /// One JSON object per line
    #[default]
    Json,
}

impl LogFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Json => "json",
        }
    }

    /// MIME type used when the artifact is uploaded
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Plain => "text/plain; charset=utf-8",
            Self::Json => "application/x-ndjson",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => Err(crate::ParseEnumError {
                kind: "log format",
                value: s.to_string(),
            }),
        }
    }
}

/// One synthesized log line
///
/// Immutable once emitted. Within a run, entries are kept in emission
/// order and timestamps never decrease along that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub service: String,
    pub message: String,
}

impl LogEntry {
    #[must_use]
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// SHA-256 digest of an artifact's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactDigest([u8; 32]);

impl ArtifactDigest {
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Lowercase hex, as used in the `x-amz-content-sha256` header
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 16 hex chars, for log output
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ArtifactDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// The full synthesized log of one run plus its trailing stack trace
///
/// Owned by the run that created it. The stores only ever borrow it, so the
/// run can hand the same bytes to the local fallback if the remote path fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashArtifact {
    crash_id: CrashId,
    scenario: ScenarioKind,
    format: LogFormat,
    entries: Vec<LogEntry>,
    stack_trace: String,
    bytes: Vec<u8>,
    digest: ArtifactDigest,
}

impl CrashArtifact {
    /// Assemble an artifact from already-encoded bytes
    ///
    /// `bytes` must be exactly what was streamed to the console for this run.
    #[must_use]
    pub fn new(
        crash_id: CrashId,
        scenario: ScenarioKind,
        format: LogFormat,
        entries: Vec<LogEntry>,
        stack_trace: String,
        bytes: Vec<u8>,
    ) -> Self {
        let digest = ArtifactDigest::compute(&bytes);
        Self {
            crash_id,
            scenario,
            format,
            entries,
            stack_trace,
            bytes,
            digest,
        }
    }

    #[inline]
    #[must_use]
    pub fn crash_id(&self) -> CrashId {
        self.crash_id
    }

    #[inline]
    #[must_use]
    pub fn scenario(&self) -> ScenarioKind {
        self.scenario
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Non-stack-trace lines, in emission order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn digest(&self) -> &ArtifactDigest {
        &self.digest
    }
}
