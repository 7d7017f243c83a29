//! Error types surfaced by a run

use std::error::Error as _;
use std::fmt;
use std::path::PathBuf;

use sluice_client::ClientError;
use sluice_core::domain::run::RunState;
use sluice_core::domain::workspace::Workspace;
use sluice_core::{ObjectUri, ParameterError};
use thiserror::Error;

/// Everything a run can end with besides success
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run parameters")]
    InvalidParameters(#[from] ParameterError),

    #[error("staging failed")]
    Staging(#[from] StagingError),

    #[error("submission failed")]
    Submission(#[source] ClientError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Terminal(#[from] TerminalJobError),

    #[error("context cancelled")]
    ContextCancelled,
}

impl RunError {
    /// The remote job's own failure, if that is what ended the run
    pub fn as_terminal(&self) -> Option<&TerminalJobError> {
        match self {
            RunError::Terminal(err) => Some(err),
            _ => None,
        }
    }
}

/// A status call failed for a reason other than throttling
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to list attempts")]
    Request(#[source] ClientError),

    #[error("no attempts found for run {run_id}")]
    NoAttempts { run_id: String },
}

/// The remote run stopped in a failed or cancelled state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("run {run_id} ended with state {state}: {detail}")]
pub struct TerminalJobError {
    pub run_id: String,
    pub state: RunState,
    pub detail: String,
}

/// The kind of failure behind a [`StagingError`]
#[derive(Debug, Error)]
pub enum StagingErrorKind {
    #[error("no workspace root configured for a staged asset")]
    MissingWorkspaceRoot,

    #[error("entrypoint {} has no file name", .0.display())]
    InvalidEntrypoint(PathBuf),

    #[error("failed to read entrypoint {}", .path.display())]
    ReadEntrypoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no project root (.git) found above {}", .0.display())]
    ProjectRootNotFound(PathBuf),

    #[error("failed to package {}: {message}", .root.display())]
    Packaging { root: PathBuf, message: String },

    #[error("failed to upload {uri}")]
    Upload {
        uri: ObjectUri,
        #[source]
        source: ClientError,
    },
}

/// Staging failed before the run was submitted
///
/// Carries the workspace when the failure happened after it was allocated,
/// so the caller can still destroy whatever was uploaded. Displays as its
/// kind and shares the kind's source.
#[derive(Debug)]
pub struct StagingError {
    pub kind: StagingErrorKind,
    pub workspace: Option<Workspace>,
}

impl StagingError {
    pub fn new(kind: StagingErrorKind) -> Self {
        Self {
            kind,
            workspace: None,
        }
    }

    pub fn in_workspace(kind: StagingErrorKind, workspace: &Workspace) -> Self {
        Self {
            kind,
            workspace: Some(workspace.clone()),
        }
    }
}

impl fmt::Display for StagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for StagingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<StagingErrorKind> for StagingError {
    fn from(kind: StagingErrorKind) -> Self {
        Self::new(kind)
    }
}
