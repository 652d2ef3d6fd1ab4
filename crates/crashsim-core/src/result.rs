//! Outcome of one simulation run

use crate::error::RunError;
use crate::state::RunState;
use crashsim_model::{
    ArtifactDigest, ArtifactLocation, CrashId, CrashRecord, NotificationResult, ScenarioKind,
    StorageBackend,
};
use serde::Serialize;
use std::fmt;

/// Everything a run produced, including partial results of a failed run
#[derive(Debug)]
pub struct SimulationResult {
    pub crash_id: CrashId,
    pub scenario: ScenarioKind,
    /// `Completed` or `Failed`
    pub state: RunState,
    /// Stage that was active when the run failed
    pub failed_at: Option<RunState>,
    /// Non-stack-trace lines synthesized
    pub lines_generated: usize,
    pub digest: Option<ArtifactDigest>,
    pub artifact: Option<ArtifactLocation>,
    pub record: Option<CrashRecord>,
    pub notification: Option<NotificationResult>,
    pub error: Option<RunError>,
}

impl SimulationResult {
    pub(crate) fn new(crash_id: CrashId, scenario: ScenarioKind) -> Self {
        Self {
            crash_id,
            scenario,
            state: RunState::Initialized,
            failed_at: None,
            lines_generated: 0,
            digest: None,
            artifact: None,
            record: None,
            notification: None,
            error: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    #[must_use]
    pub fn artifact_persisted(&self) -> bool {
        self.artifact.is_some()
    }

    #[must_use]
    pub fn crash_recorded(&self) -> bool {
        self.record.is_some()
    }

    #[must_use]
    pub fn notification_sent(&self) -> bool {
        self.notification.as_ref().is_some_and(|n| n.sent)
    }

    /// Flat, serializable view for output
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            crash_id: self.crash_id,
            scenario: self.scenario,
            state: self.state,
            failed_at: self.failed_at,
            lines_generated: self.lines_generated,
            digest: self.digest.as_ref().map(ArtifactDigest::to_hex),
            artifact_persisted: self.artifact_persisted(),
            backend: self.artifact.as_ref().map(|a| a.backend),
            location: self.artifact.as_ref().map(ArtifactLocation::link),
            crash_recorded: self.crash_recorded(),
            notification_sent: self.notification_sent(),
            notification_reason: self
                .notification
                .as_ref()
                .and_then(|n| n.reason.clone()),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub crash_id: CrashId,
    pub scenario: ScenarioKind,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<RunState>,
    pub lines_generated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub artifact_persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StorageBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub crash_recorded: bool,
    pub notification_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "yes"
    } else {
        "no"
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "crash {} ({})", self.crash_id, self.scenario)?;
        match self.failed_at {
            Some(stage) => writeln!(f, "  state:              {} (at {stage})", self.state)?,
            None => writeln!(f, "  state:              {}", self.state)?,
        }
        writeln!(f, "  lines generated:    {}", self.lines_generated)?;
        match (&self.backend, &self.location) {
            (Some(backend), Some(location)) => {
                writeln!(f, "  artifact persisted: yes ({backend}) {location}")?;
            }
            _ => writeln!(f, "  artifact persisted: no")?,
        }
        writeln!(f, "  crash recorded:     {}", mark(self.crash_recorded))?;
        match &self.notification_reason {
            Some(reason) if !self.notification_sent => {
                write!(f, "  notification sent:  no ({reason})")?;
            }
            _ => write!(f, "  notification sent:  {}", mark(self.notification_sent))?,
        }
        if let Some(error) = &self.error {
            write!(f, "\n  error:              {error}")?;
        }
        Ok(())
    }
}
