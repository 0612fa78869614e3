//! Run identity, lifecycle state machine, and terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Mood, Style};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// Identifier for one end-to-end run.
///
/// Timestamp-derived (`YYYYMMDD_HHMMSS`) so that log files and scratch
/// directories sort by creation time, with a short random suffix so
/// that concurrently created runs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Derive a fresh id from a creation timestamp.
    pub fn generate(created_at: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        RunId(format!(
            "{}_{}",
            created_at.format("%Y%m%d_%H%M%S"),
            &suffix[..6]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a run.
///
/// `Failed` is reachable from every non-terminal state when a stage
/// exhausts its retry budget or hits a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    Scripting,
    MediaGeneration,
    Assembling,
    AwaitingApproval,
    Approved,
    Rejected,
    Done,
    Failed,
}

impl RunState {
    /// Returns the set of states reachable from `self`.
    ///
    /// Terminal states (`Done`, `Failed`) return an empty slice.
    pub fn valid_transitions(self) -> &'static [RunState] {
        use RunState::*;
        match self {
            Created => &[Scripting, Failed],
            Scripting => &[MediaGeneration, Failed],
            MediaGeneration => &[Assembling, Failed],
            Assembling => &[AwaitingApproval, Failed],
            AwaitingApproval => &[Approved, Rejected, Failed],
            Approved => &[Done],
            Rejected => &[Done],
            Done | Failed => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: RunState) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Terminal status
// ---------------------------------------------------------------------------

/// Outcome of a run as recorded in the audit file.
///
/// `Pending` while the run is in flight; exactly one of the other three
/// once it reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Approved,
    Rejected,
    Failed,
}

/// A reviewer's verdict on an assembled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for RunStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => RunStatus::Approved,
            Decision::Rejected => RunStatus::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One end-to-end execution from topic to approved/rejected outcome.
///
/// Owned exclusively by the orchestrator. The input fields (`topic`,
/// `style`, `mood`) are never mutated after creation; only `state` and
/// `status` change, through [`Run::advance`] and the approval decision.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: RunId,
    pub topic: String,
    pub style: Style,
    pub mood: Mood,
    pub created_at: DateTime<Utc>,
    pub state: RunState,
    pub status: RunStatus,
}

impl Run {
    /// Create a run in the `Created` state with a fresh timestamp-derived id.
    pub fn new(topic: String, style: Style, mood: Mood) -> Self {
        let created_at = Utc::now();
        Run {
            id: RunId::generate(created_at),
            topic,
            style,
            mood,
            created_at,
            state: RunState::Created,
            status: RunStatus::Pending,
        }
    }

    /// Advance the state machine, rejecting transitions the table does
    /// not allow.
    pub fn advance(&mut self, to: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition(to) {
            return Err(PipelineError::Configuration(format!(
                "Invalid run state transition: {:?} -> {:?}",
                self.state, to
            )));
        }
        tracing::debug!(run_id = %self.id, from = ?self.state, to = ?to, "Run state transition");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- RunId ---------------------------------------------------------------

    #[test]
    fn run_id_starts_with_timestamp() {
        let now = Utc::now();
        let id = RunId::generate(now);
        assert!(id.as_str().starts_with(&now.format("%Y%m%d_%H%M%S").to_string()));
    }

    #[test]
    fn run_ids_are_unique_for_same_instant() {
        let now = Utc::now();
        assert_ne!(RunId::generate(now), RunId::generate(now));
    }

    // -- Transition table ----------------------------------------------------

    #[test]
    fn created_to_scripting() {
        assert!(RunState::Created.can_transition(RunState::Scripting));
    }

    #[test]
    fn scripting_to_media_generation() {
        assert!(RunState::Scripting.can_transition(RunState::MediaGeneration));
    }

    #[test]
    fn media_generation_to_assembling() {
        assert!(RunState::MediaGeneration.can_transition(RunState::Assembling));
    }

    #[test]
    fn assembling_to_awaiting_approval() {
        assert!(RunState::Assembling.can_transition(RunState::AwaitingApproval));
    }

    #[test]
    fn awaiting_approval_to_decision() {
        assert!(RunState::AwaitingApproval.can_transition(RunState::Approved));
        assert!(RunState::AwaitingApproval.can_transition(RunState::Rejected));
    }

    #[test]
    fn decisions_lead_to_done() {
        assert!(RunState::Approved.can_transition(RunState::Done));
        assert!(RunState::Rejected.can_transition(RunState::Done));
    }

    #[test]
    fn failed_reachable_from_every_non_terminal_state() {
        for state in [
            RunState::Created,
            RunState::Scripting,
            RunState::MediaGeneration,
            RunState::Assembling,
            RunState::AwaitingApproval,
        ] {
            assert!(state.can_transition(RunState::Failed), "{state:?}");
        }
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn decision_states_cannot_fail() {
        // Approved/Rejected only flow to Done; finalization failures are
        // surfaced as errors, not as state rewrites.
        assert!(!RunState::Approved.can_transition(RunState::Failed));
        assert!(!RunState::Rejected.can_transition(RunState::Failed));
    }

    #[test]
    fn skipping_states_is_invalid() {
        assert!(!RunState::Created.can_transition(RunState::Assembling));
        assert!(!RunState::Scripting.can_transition(RunState::AwaitingApproval));
    }

    // -- Run::advance --------------------------------------------------------

    #[test]
    fn advance_follows_table() {
        let mut run = Run::new("ocean waves".into(), Style::Cinematic, Mood::Calm);
        assert_eq!(run.state, RunState::Created);
        run.advance(RunState::Scripting).unwrap();
        run.advance(RunState::MediaGeneration).unwrap();
        run.advance(RunState::Assembling).unwrap();
        run.advance(RunState::AwaitingApproval).unwrap();
        run.advance(RunState::Approved).unwrap();
        run.advance(RunState::Done).unwrap();
        assert!(run.state.is_terminal());
    }

    #[test]
    fn decision_maps_to_terminal_status() {
        assert_eq!(RunStatus::from(Decision::Approved), RunStatus::Approved);
        assert_eq!(RunStatus::from(Decision::Rejected), RunStatus::Rejected);
    }

    #[test]
    fn advance_rejects_invalid_transition() {
        let mut run = Run::new("ocean waves".into(), Style::Cinematic, Mood::Calm);
        let err = run.advance(RunState::Assembling).unwrap_err();
        assert!(err.to_string().contains("Invalid run state transition"));
        // State unchanged after a rejected transition.
        assert_eq!(run.state, RunState::Created);
    }
}
