//! Run state machine
//!
//! `Initialized → Generating → Persisting → Recording → Notifying → Completed`,
//! forward only. Every non-terminal state may also drop to `Failed`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a run is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initialized,
    Generating,
    Persisting,
    Recording,
    Notifying,
    Completed,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Recording => "recording",
            Self::Notifying => "notifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal run transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: RunState,
    pub to: RunState,
}

/// Check a single step
///
/// # Errors
/// [`IllegalTransition`] when `to` is not reachable from `from` in one step.
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), IllegalTransition> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::*;
    match from {
        Initialized => vec![Generating, Failed],
        Generating => vec![Persisting, Failed],
        Persisting => vec![Recording, Failed],
        Recording => vec![Notifying, Failed],
        Notifying => vec![Completed],
        Completed => vec![],
        Failed => vec![],
    }
}

fn allowed(from: RunState, to: RunState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Current state plus the path taken to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTracker {
    current: RunState,
    history: Vec<RunState>,
    failed_at: Option<RunState>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RunState::Initialized,
            history: vec![RunState::Initialized],
            failed_at: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> RunState {
        self.current
    }

    #[must_use]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Stage that was active when the run failed
    #[must_use]
    pub fn failed_at(&self) -> Option<RunState> {
        self.failed_at
    }

    /// # Errors
    /// [`IllegalTransition`] if the step is not allowed; state is unchanged.
    pub fn advance(&mut self, to: RunState) -> Result<(), IllegalTransition> {
        validate_transition(self.current, to)?;
        tracing::debug!(from = %self.current, %to, "run transition");
        if to == RunState::Failed {
            self.failed_at = Some(self.current);
        }
        self.current = to;
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [RunState; 7] = [
        RunState::Initialized,
        RunState::Generating,
        RunState::Persisting,
        RunState::Recording,
        RunState::Notifying,
        RunState::Completed,
        RunState::Failed,
    ];

    fn rank(s: RunState) -> usize {
        ALL.iter().position(|x| *x == s).unwrap_or_default()
    }

    #[test]
    fn happy_path_is_valid() {
        let mut tracker = RunTracker::new();
        for s in &ALL[1..6] {
            tracker.advance(*s).unwrap();
        }
        assert_eq!(tracker.current(), RunState::Completed);
        assert_eq!(tracker.history().len(), 6);
        assert_eq!(tracker.failed_at(), None);
    }

    #[test]
    fn failure_remembers_stage() {
        let mut tracker = RunTracker::new();
        tracker.advance(RunState::Generating).unwrap();
        tracker.advance(RunState::Persisting).unwrap();
        tracker.advance(RunState::Failed).unwrap();
        assert_eq!(tracker.failed_at(), Some(RunState::Persisting));
        assert!(tracker.advance(RunState::Recording).is_err());
    }

    #[test]
    fn notifying_cannot_fail() {
        assert!(validate_transition(RunState::Notifying, RunState::Failed).is_err());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(allowed_transitions(RunState::Completed).is_empty());
        assert!(allowed_transitions(RunState::Failed).is_empty());
        assert!(RunState::Completed.is_terminal());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let err = validate_transition(RunState::Generating, RunState::Recording).unwrap_err();
        assert_eq!(err.to_string(), "illegal run transition generating -> recording");
    }

    proptest! {
        #[test]
        fn no_backward_transitions(from in 0usize..7, to in 0usize..7) {
            let (from, to) = (ALL[from], ALL[to]);
            if validate_transition(from, to).is_ok() {
                prop_assert!(rank(to) > rank(from));
            }
        }
    }
}
