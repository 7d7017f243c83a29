//! Run domain types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a submitted remote run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    pub application_id: String,
    pub run_id: String,
}

impl RunHandle {
    pub fn new(application_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// State of a run attempt as reported by the control plane
///
/// The service documents an open-ended set of values, so anything not
/// recognised is kept verbatim in `Other` and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Submitted,
    Pending,
    Scheduled,
    Queued,
    Running,
    Success,
    Failed,
    Cancelling,
    Cancelled,
    Other(String),
}

impl RunState {
    /// Wire representation of the state
    pub fn as_str(&self) -> &str {
        match self {
            RunState::Submitted => "SUBMITTED",
            RunState::Pending => "PENDING",
            RunState::Scheduled => "SCHEDULED",
            RunState::Queued => "QUEUED",
            RunState::Running => "RUNNING",
            RunState::Success => "SUCCESS",
            RunState::Failed => "FAILED",
            RunState::Cancelling => "CANCELLING",
            RunState::Cancelled => "CANCELLED",
            RunState::Other(raw) => raw,
        }
    }

    /// Success, Failed and Cancelled end a run; everything else keeps polling
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Success | RunState::Failed | RunState::Cancelled
        )
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, RunState::Other(_))
    }
}

impl From<&str> for RunState {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => RunState::Submitted,
            "PENDING" => RunState::Pending,
            "SCHEDULED" => RunState::Scheduled,
            "QUEUED" => RunState::Queued,
            "RUNNING" => RunState::Running,
            "SUCCESS" => RunState::Success,
            "FAILED" => RunState::Failed,
            "CANCELLING" => RunState::Cancelling,
            "CANCELLED" => RunState::Cancelled,
            _ => RunState::Other(raw.to_string()),
        }
    }
}

impl From<String> for RunState {
    fn from(raw: String) -> Self {
        RunState::from(raw.as_str())
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt backing a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAttempt {
    pub attempt: u32,
    pub state: RunState,
    pub state_details: String,
}

/// A page of attempts plus the cursor for the next page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptPage {
    pub attempts: Vec<RunAttempt>,
    pub next_token: Option<String>,
}

impl AttemptPage {
    /// The most recent attempt on this page
    pub fn latest(&self) -> Option<&RunAttempt> {
        self.attempts.last()
    }
}
