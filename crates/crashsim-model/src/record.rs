//! Crash records and notification outcomes

use crate::ids::{ArtifactKey, CrashId};
use crate::location::{ArtifactLocation, StorageBackend};
use crate::scenario::{ScenarioDefinition, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Snapshot of a scenario's crash metadata taken at generation time
///
/// Copied, not referenced: later catalog edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub component: String,
    pub error_type: String,
}

impl ErrorDetails {
    #[must_use]
    pub fn from_scenario(scenario: &ScenarioDefinition) -> Self {
        Self {
            title: scenario.title.clone(),
            description: scenario.description.clone(),
            severity: scenario.severity,
            component: scenario.component.clone(),
            error_type: scenario.error_type.clone(),
        }
    }
}

/// Lifecycle status of a crash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrashStatus {
    #[default]
    Active,
    Resolved,
    Closed,
}

impl fmt::Display for CrashStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        })
    }
}

/// Structured crash metadata as stored in the crash table
///
/// Attribute names are consumed by the dashboard and must not change:
/// `crashId`, `scenario`, `timestamp`, `s3Url`, `s3Key`, `errorDetails`,
/// `usersImpacted`, `status`, `createdAt`, `updatedAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    pub crash_id: CrashId,
    pub scenario: String,
    pub timestamp: DateTime<Utc>,
    pub s3_url: String,
    pub s3_key: String,
    pub artifact_backend: StorageBackend,
    pub error_details: ErrorDetails,
    pub users_impacted: u32,
    pub status: CrashStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrashRecord {
    /// Build a fresh `active` record for a run
    #[must_use]
    pub fn new(
        crash_id: CrashId,
        scenario: &ScenarioDefinition,
        location: &ArtifactLocation,
        users_impacted: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            crash_id,
            scenario: scenario.name.to_string(),
            timestamp: now,
            s3_url: location.link(),
            s3_key: location.key.to_string(),
            artifact_backend: location.backend,
            error_details: ErrorDetails::from_scenario(scenario),
            users_impacted,
            status: CrashStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstruct the artifact location this record points at
    #[must_use]
    pub fn artifact_location(&self) -> ArtifactLocation {
        let key = ArtifactKey::from_stored(self.s3_key.clone());
        match self.artifact_backend {
            StorageBackend::RemoteObjectStore => ArtifactLocation::remote(key, self.s3_url.clone()),
            StorageBackend::LocalDisk => {
                let path = self
                    .s3_url
                    .strip_prefix("file://")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(&self.s3_url));
                ArtifactLocation::local(key, path)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.error_details.severity
    }
}

/// Outcome of the best-effort notification step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResult {
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NotificationResult {
    #[must_use]
    pub fn sent() -> Self {
        Self {
            sent: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn not_sent(reason: impl Into<String>) -> Self {
        Self {
            sent: false,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{LineTemplate, LogLevel, ScenarioContext, ScenarioKind};

    fn scenario() -> ScenarioDefinition {
        ScenarioDefinition {
            name: ScenarioKind::PaystackTimeout,
            title: "Payment Gateway Timeout".to_string(),
            description: "timed out".to_string(),
            severity: Severity::Critical,
            component: "PAYMENT_SERVICE".to_string(),
            error_type: "httpx.ConnectTimeout".to_string(),
            context: ScenarioContext::empty(),
            log_template: vec![LineTemplate::new("PAYMENTS", LogLevel::Error, "timeout")],
            stack_trace_template: "httpx.ConnectTimeout: boom".to_string(),
            default_min_logs: 10,
        }
    }

    #[test]
    fn record_serializes_dashboard_attribute_names() {
        let id = CrashId::new();
        let key = ArtifactKey::for_run(&id);
        let location = ArtifactLocation::remote(key, "https://b.s3.us-east-1.amazonaws.com/x");
        let record = CrashRecord::new(id, &scenario(), &location, 120, Utc::now());

        let value = serde_json::to_value(&record).unwrap();
        for attr in [
            "crashId",
            "scenario",
            "timestamp",
            "s3Url",
            "s3Key",
            "errorDetails",
            "usersImpacted",
            "status",
            "createdAt",
            "updatedAt",
        ] {
            assert!(value.get(attr).is_some(), "missing attribute {attr}");
        }
        assert_eq!(value["errorDetails"]["errorType"], "httpx.ConnectTimeout");
        assert_eq!(value["errorDetails"]["severity"], "critical");
        assert_eq!(value["status"], "active");
    }

    #[test]
    fn error_details_are_a_snapshot() {
        let mut def = scenario();
        let details = ErrorDetails::from_scenario(&def);
        def.title = "edited later".to_string();
        assert_eq!(details.title, "Payment Gateway Timeout");
    }

    #[test]
    fn local_record_round_trips_location() {
        let id = CrashId::new();
        let key = ArtifactKey::for_run(&id);
        let location = ArtifactLocation::local(key.clone(), "/tmp/logs/a.log");
        let record = CrashRecord::new(id, &scenario(), &location, 1, Utc::now());

        assert_eq!(record.s3_url, "file:///tmp/logs/a.log");
        assert_eq!(record.artifact_location(), location);
    }
}
