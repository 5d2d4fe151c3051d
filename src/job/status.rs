/// Job status definitions for the engine state machine
///
/// This module defines every state a prefetch job can be in and which
/// transitions between them are legal.
use crate::storage::RunStatus;
use serde::Serialize;
use std::fmt;

/// Represents the current state of the prefetch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    // ===== Idle State =====
    /// No job has run since the engine was created
    #[default]
    Idle,

    // ===== Active States =====
    /// The worker is crawling
    Running,

    /// Pause requested, waiting for the worker to reach a checkpoint
    Pausing,

    /// The worker is parked at a checkpoint
    Paused,

    /// Resume requested, waiting for the worker to wake up
    Resuming,

    /// Cancel requested, waiting for the worker to reach a checkpoint
    Cancelling,

    // ===== Terminal States =====
    /// Every selected catalog was walked
    Completed,

    /// The run hit an unrecoverable error
    Failed,

    /// Stopped by the user or by the execution-time budget
    Cancelled,
}

impl JobStatus {
    /// Returns true if a job is in flight
    ///
    /// Only one job may be active at a time.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Running | Self::Pausing | Self::Paused | Self::Resuming | Self::Cancelling
        )
    }

    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if a run request would be accepted
    pub fn accepts_run(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        match (self, next) {
            (Idle | Completed | Failed | Cancelled, Running) => true,
            (Running, Pausing | Cancelling) => true,
            // A pause retracted before the worker reached a checkpoint
            (Pausing, Running | Paused | Cancelling) => true,
            (Paused, Resuming | Cancelled) => true,
            (Resuming, Running | Pausing | Cancelling) => true,
            // The worker can finish from any state it is not parked in
            (Running | Pausing | Resuming | Cancelling, Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }

    /// The persisted run status for a terminal state
    pub fn to_run_status(&self) -> Option<RunStatus> {
        match self {
            Self::Completed => Some(RunStatus::Completed),
            Self::Failed => Some(RunStatus::Failed),
            Self::Cancelled => Some(RunStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Pausing => "pausing",
            Self::Paused => "paused",
            Self::Resuming => "resuming",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Name shown to users
    ///
    /// An idle engine with an upcoming scheduled trigger presents as "scheduled".
    pub fn display_name(&self, has_upcoming_trigger: bool) -> &'static str {
        if *self == Self::Idle && has_upcoming_trigger {
            "scheduled"
        } else {
            self.as_str()
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Running,
            Self::Pausing,
            Self::Paused,
            Self::Resuming,
            Self::Cancelling,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_and_terminal_are_disjoint() {
        for state in JobStatus::all_states() {
            assert!(!(state.is_active() && state.is_terminal()), "{}", state);
        }
        assert!(!JobStatus::Idle.is_active());
        assert!(!JobStatus::Idle.is_terminal());
    }

    #[test]
    fn test_accepts_run() {
        let accepting: Vec<_> = JobStatus::all_states()
            .into_iter()
            .filter(|s| s.accepts_run())
            .collect();
        assert_eq!(
            accepting,
            vec![
                JobStatus::Idle,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled
            ]
        );
    }

    #[test]
    fn test_paused_cancel_skips_running() {
        assert!(JobStatus::Paused.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Paused.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Paused.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_pause_resume_cycle() {
        assert!(JobStatus::Running.can_transition_to(JobStatus::Pausing));
        assert!(JobStatus::Pausing.can_transition_to(JobStatus::Paused));
        assert!(JobStatus::Paused.can_transition_to(JobStatus::Resuming));
        assert!(JobStatus::Resuming.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Idle.can_transition_to(JobStatus::Paused));
    }

    #[test]
    fn test_terminal_states_restart() {
        for state in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(state.can_transition_to(JobStatus::Running));
            assert!(!state.can_transition_to(JobStatus::Paused));
        }
    }

    #[test]
    fn test_run_status_mapping() {
        assert_eq!(JobStatus::Completed.to_run_status(), Some(RunStatus::Completed));
        assert_eq!(JobStatus::Cancelled.to_run_status(), Some(RunStatus::Cancelled));
        assert_eq!(JobStatus::Running.to_run_status(), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(JobStatus::Idle.display_name(true), "scheduled");
        assert_eq!(JobStatus::Idle.display_name(false), "idle");
        assert_eq!(JobStatus::Running.display_name(true), "running");
        assert_eq!(JobStatus::Cancelling.to_string(), "cancelling");
    }
}
