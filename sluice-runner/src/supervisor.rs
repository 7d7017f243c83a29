//! Run supervisor
//!
//! Submits a run and polls it to a terminal outcome. Each poll cycle waits
//! for the poll timer (or cancellation), lists the run's attempts, reports
//! state transitions, drains new log lines, and classifies the latest state.

use std::sync::Arc;

use sluice_client::ControlPlane;
use sluice_core::domain::run::{RunAttempt, RunHandle, RunState};
use sluice_core::dto::job_run::StartJobRunRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RunError, TerminalJobError, TransportError};
use crate::logs::LogConsumer;
use crate::outcome::RunOutcome;
use crate::poll_timer::PollTimer;
use crate::sink::LineSink;

pub struct RunSupervisor {
    control_plane: Arc<dyn ControlPlane>,
    sink: Arc<dyn LineSink>,
    timer: PollTimer,
}

impl RunSupervisor {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        sink: Arc<dyn LineSink>,
        timer: PollTimer,
    ) -> Self {
        Self {
            control_plane,
            sink,
            timer,
        }
    }

    pub fn timer(&self) -> &PollTimer {
        &self.timer
    }

    /// Sends the submission request once
    pub async fn submit(&self, request: &StartJobRunRequest) -> Result<RunHandle, RunError> {
        let handle = self
            .control_plane
            .start_job_run(request)
            .await
            .map_err(RunError::Submission)?;

        info!("Created job run: {}", handle.run_id);
        Ok(handle)
    }

    /// Polls `handle` until the run reaches a terminal state or fails locally
    ///
    /// Cancellation is checked once per cycle, while waiting for the timer;
    /// an in-flight status call is never interrupted.
    pub async fn supervise(
        &mut self,
        handle: &RunHandle,
        logs: &mut dyn LogConsumer,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let mut previous_state: Option<RunState> = None;
        let mut next_token: Option<String> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Supervision of run {} cancelled", handle.run_id);
                    return RunOutcome::ContextCancelled;
                }
                _ = tokio::time::sleep(self.timer.duration()) => {}
            }

            let page = match self
                .control_plane
                .list_job_run_attempts(handle, next_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) if e.is_throttling() => {
                    self.timer.increase();
                    debug!(
                        "Status call throttled, next poll in {:?}: {}",
                        self.timer.duration(),
                        e
                    );
                    continue;
                }
                Err(e) => {
                    return RunOutcome::LocalError(TransportError::Request(e).into());
                }
            };
            self.timer.reset();

            let Some(latest) = page.latest() else {
                return RunOutcome::LocalError(
                    TransportError::NoAttempts {
                        run_id: handle.run_id.clone(),
                    }
                    .into(),
                );
            };

            if previous_state.as_ref() != Some(&latest.state) {
                if !latest.state.is_recognized() {
                    warn!(
                        "Run {} reported unrecognized state {}, continuing to poll",
                        handle.run_id, latest.state
                    );
                }
                self.sink.emit(&transition_line(&handle.run_id, latest));
                previous_state = Some(latest.state.clone());
            }

            let batch = if latest.state.is_terminal() {
                logs.drain().await
            } else {
                logs.next_batch().await
            };
            for line in batch {
                self.sink.emit(&line.to_string());
            }

            match &latest.state {
                RunState::Success => return RunOutcome::Succeeded,
                RunState::Failed => {
                    return RunOutcome::Failed(terminal_error(handle, latest));
                }
                RunState::Cancelled => {
                    return RunOutcome::Cancelled(terminal_error(handle, latest));
                }
                _ => {}
            }

            if let Some(token) = page.next_token {
                next_token = Some(token);
            }
        }
    }
}

fn transition_line(run_id: &str, attempt: &RunAttempt) -> String {
    format!("{} | {} | {}", run_id, attempt.state, attempt.state_details)
}

fn terminal_error(handle: &RunHandle, attempt: &RunAttempt) -> TerminalJobError {
    TerminalJobError {
        run_id: handle.run_id.clone(),
        state: attempt.state.clone(),
        detail: attempt.state_details.clone(),
    }
}
