use std::fmt;

use super::job::{FailureKind, JobId, JobOutcome, JobStatus};
use crate::error::ControllerError;

/// Lifecycle of a generation controller.
///
/// `Idle → Polling → Terminated`, and back to `Polling` when a new job starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Polling,
    Terminated(JobOutcome),
}

impl ControllerState {
    pub fn is_polling(&self) -> bool {
        matches!(self, ControllerState::Polling)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Idle => write!(f, "IDLE"),
            ControllerState::Polling => write!(f, "POLLING"),
            ControllerState::Terminated(JobOutcome::Success(_)) => write!(f, "TERMINATED(success)"),
            ControllerState::Terminated(JobOutcome::Failure(_)) => write!(f, "TERMINATED(failure)"),
        }
    }
}

/// What the controller should do with a status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The job is still running. `schedule_timer` is set only when no timer
    /// is active yet, so repeated Working replies never stack timers.
    KeepPolling { schedule_timer: bool },
    /// The artifact with this filename is ready.
    Finish(String),
    /// The job ended without an artifact.
    Fail(FailureKind),
}

/// Interprets server replies and owns the controller's transition table.
pub struct StateMachine;

impl StateMachine {
    /// Map a status reply to the action the controller must take.
    ///
    /// Total over [`JobStatus`]: anything the protocol does not define ends
    /// the job as a protocol failure instead of polling forever.
    pub fn interpret(status: JobStatus, timer_active: bool) -> Transition {
        match status {
            JobStatus::Working => Transition::KeepPolling {
                schedule_timer: !timer_active,
            },
            JobStatus::Ready { filename } => Transition::Finish(filename),
            JobStatus::Error { message } => Transition::Fail(FailureKind::Server(message)),
            JobStatus::Unknown { raw } => Transition::Fail(FailureKind::Protocol(raw)),
        }
    }

    /// Enter `Polling` for a new job. Rejected while `current` is still polling.
    pub fn begin(
        state: &ControllerState,
        current: Option<&JobId>,
    ) -> Result<ControllerState, ControllerError> {
        match (state, current) {
            (ControllerState::Polling, Some(id)) => Err(ControllerError::JobInFlight(id.clone())),
            _ => Ok(ControllerState::Polling),
        }
    }

    /// Compute the state after `transition`. `outcome` is the result to record
    /// when the transition is terminal (the caller resolves the download link).
    ///
    /// Transitions outside `Polling` leave the state untouched; a reply that
    /// arrives after termination must not revive the job.
    pub fn advance(
        state: &ControllerState,
        transition: &Transition,
        outcome: impl FnOnce() -> JobOutcome,
    ) -> ControllerState {
        match (state, transition) {
            (ControllerState::Polling, Transition::KeepPolling { .. }) => ControllerState::Polling,
            (ControllerState::Polling, Transition::Finish(_) | Transition::Fail(_)) => {
                ControllerState::Terminated(outcome())
            }
            (ControllerState::Idle | ControllerState::Terminated(_), _) => state.clone(),
        }
    }
}
