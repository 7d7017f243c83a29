//! Run outcomes
//!
//! Exactly one outcome ends every supervised run. Cleanup decisions are made
//! by matching on it, never by inspecting error values.

use crate::error::{RunError, TerminalJobError};

/// Terminal classification of a supervised run
#[derive(Debug)]
pub enum RunOutcome {
    Succeeded,
    Failed(TerminalJobError),
    Cancelled(TerminalJobError),
    LocalError(RunError),
    ContextCancelled,
}

impl RunOutcome {
    /// Whether the remote run may still be alive and should be cancelled
    ///
    /// Succeeded, Failed and Cancelled runs have already stopped.
    pub fn requires_remote_cancel(&self) -> bool {
        match self {
            RunOutcome::Succeeded | RunOutcome::Failed(_) | RunOutcome::Cancelled(_) => false,
            RunOutcome::LocalError(_) | RunOutcome::ContextCancelled => true,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }

    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Failed(_) => "failed",
            RunOutcome::Cancelled(_) => "cancelled",
            RunOutcome::LocalError(_) => "local error",
            RunOutcome::ContextCancelled => "context cancelled",
        }
    }

    /// Converts the outcome into what the caller sees
    pub fn into_result(self) -> Result<(), RunError> {
        match self {
            RunOutcome::Succeeded => Ok(()),
            RunOutcome::Failed(err) | RunOutcome::Cancelled(err) => Err(RunError::Terminal(err)),
            RunOutcome::LocalError(err) => Err(err),
            RunOutcome::ContextCancelled => Err(RunError::ContextCancelled),
        }
    }
}
