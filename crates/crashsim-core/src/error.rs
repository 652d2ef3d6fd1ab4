//! Error types for the simulation pipeline
//!
//! - [`SimulationError`]: the run never started (caller error)
//! - [`RunError`]: a stage failed after the run started; carried inside the
//!   [`SimulationResult`](crate::SimulationResult) with the partial results
//! - [`ConfigError`]: a component could not be built from configuration

use crate::state::{IllegalTransition, RunState};
use crashsim_notify::NotifyError;
use crashsim_store::{KvError, ObjectStoreError, RecordingError, StoreError};

/// Rejected before any side effect
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Name is not in the scenario catalog
    #[error("unknown scenario '{name}' (known: {known})")]
    UnknownScenario { name: String, known: String },
}

/// Fatal stage failure
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Local fallback write failed; the artifact exists nowhere
    #[error("artifact persistence failed: {0}")]
    Storage(#[from] StoreError),

    /// The artifact may exist but no record points at it
    #[error(transparent)]
    Recording(#[from] RecordingError),

    /// Shutdown requested; the run stopped at a stage boundary
    #[error("run interrupted before {stage}")]
    Interrupted { stage: RunState },

    #[error(transparent)]
    Transition(#[from] IllegalTransition),
}

impl RunError {
    /// Short classification used in summaries
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage_fatal",
            Self::Recording(_) => "recording",
            Self::Interrupted { .. } => "interrupted",
            Self::Transition(_) => "internal",
        }
    }
}

/// Component construction error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("object store configuration: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("crash table configuration: {0}")]
    CrashTable(#[from] KvError),

    #[error("messaging configuration: {0}")]
    Messaging(#[from] NotifyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crashsim_model::CrashId;
    use std::time::Duration;

    #[test]
    fn recording_and_storage_are_distinct() {
        let recording = RunError::from(RecordingError {
            crash_id: CrashId::new(),
            source: KvError::Timeout(Duration::from_secs(1)),
        });
        let storage = RunError::from(StoreError::LocalWrite {
            path: "/nope/x.log".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(recording.kind(), "recording");
        assert_eq!(storage.kind(), "storage_fatal");
        assert!(storage.to_string().starts_with("artifact persistence failed"));
    }

    #[test]
    fn interrupted_names_the_stage() {
        let err = RunError::Interrupted {
            stage: RunState::Persisting,
        };
        assert_eq!(err.to_string(), "run interrupted before persisting");
    }
}
