//! Canonical job state derived from raw device flags.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::types::StatusSnapshot;

/// Stable job status vocabulary exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Idle,
    Printing,
    Paused,
    Canceling,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "Idle",
            JobStatus::Printing => "Printing",
            JobStatus::Paused => "Paused",
            JobStatus::Canceling => "Canceling",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a [`StateCanonicalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalState {
    pub status: JobStatus,
    pub paused: bool,
    /// A stop was requested and the device has not stopped yet.
    pub cancel_latched: bool,
    /// The job ran to completion since the previous poll.
    pub finished: bool,
}

/// Turns raw status snapshots into [`CanonicalState`].
///
/// Implementations may keep state across polls (cancel latch, finish
/// edge detection); they are called once per poll, in poll order.
pub trait StateCanonicalizer: Send + Sync {
    fn canonicalize(&self, status: &StatusSnapshot) -> CanonicalState;

    /// Called after a stop command was accepted by the device.
    fn note_cancel_requested(&self) {}
}

#[derive(Debug, Default)]
struct MachineState {
    cancel_latched: bool,
    was_printing: bool,
}

/// Default canonicalizer for NanoDLP status flags.
///
/// - `printing && paused` → Paused, `printing` → Printing, else Idle.
/// - After [`note_cancel_requested`](StateCanonicalizer::note_cancel_requested)
///   the status reads Canceling until the device stops printing; the latch
///   is then released.
/// - `finished` is reported once on the printing → idle edge, unless the
///   job was canceled.
#[derive(Debug, Default)]
pub struct NanoDlpStateMachine {
    state: Mutex<MachineState>,
}

impl NanoDlpStateMachine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateCanonicalizer for NanoDlpStateMachine {
    fn canonicalize(&self, status: &StatusSnapshot) -> CanonicalState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let canceled = state.cancel_latched && !status.printing;
        if canceled {
            state.cancel_latched = false;
        }
        let finished = state.was_printing && !status.printing && !canceled;
        state.was_printing = status.printing;

        let job_status = if state.cancel_latched {
            JobStatus::Canceling
        } else if status.printing && status.paused {
            JobStatus::Paused
        } else if status.printing {
            JobStatus::Printing
        } else {
            JobStatus::Idle
        };

        CanonicalState {
            status: job_status,
            paused: status.printing && status.paused,
            cancel_latched: state.cancel_latched,
            finished,
        }
    }

    fn note_cancel_requested(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.was_printing {
            state.cancel_latched = true;
        }
    }
}
