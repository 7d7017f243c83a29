//! Sluice runner
//!
//! Stages a script asset into object storage, submits it to a managed
//! batch-compute service, and supervises the run to a terminal outcome:
//! polling with adaptive backoff, draining remote logs, classifying the final
//! state, and cleaning up (workspace deletion, best-effort cancellation) on
//! every exit path.
//!
//! Components:
//! - [`stager`]: workspace upload and deletion
//! - [`submitter`]: submission request building
//! - [`supervisor`]: the poll/backoff/cancel loop
//! - [`poll_timer`]: adaptive poll interval
//! - [`logs`]: incremental remote log consumers
//! - [`job`]: the stage → submit → supervise → cleanup flow

pub mod config;
pub mod connection;
pub mod error;
pub mod job;
pub mod logs;
pub mod outcome;
pub mod poll_timer;
pub mod sink;
pub mod stager;
pub mod submitter;
pub mod supervisor;

pub use config::RunnerConfig;
pub use connection::ConnectionConfig;
pub use error::{RunError, StagingError, StagingErrorKind, TerminalJobError, TransportError};
pub use job::{Job, JobRunner};
pub use logs::{LogConsumer, LogDestination};
pub use outcome::RunOutcome;
pub use poll_timer::PollTimer;
pub use sink::{BufferedSink, LineSink, StdoutSink, TracingSink};
pub use stager::WorkspaceStager;
pub use supervisor::RunSupervisor;
