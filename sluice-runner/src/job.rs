//! Job runs
//!
//! Drives one asset through stage → submit → supervise → cleanup. Workspace
//! destruction and remote cancellation run after supervision on their own
//! timeouts, independent of the caller's cancellation token, and their
//! failures never change the run's result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sluice_client::{ControlPlane, ObjectStore};
use sluice_core::domain::asset::Asset;
use sluice_core::domain::params::{ConnectionDefaults, RunParameters};
use sluice_core::domain::run::RunHandle;
use sluice_core::domain::workspace::Workspace;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::RunError;
use crate::logs::{LogDestination, build_log_consumer};
use crate::outcome::RunOutcome;
use crate::poll_timer::PollTimer;
use crate::sink::{LineSink, TracingSink};
use crate::stager::WorkspaceStager;
use crate::submitter;
use crate::supervisor::RunSupervisor;

/// Everything needed to execute one asset remotely
#[derive(Debug, Clone)]
pub struct Job {
    pub asset: Asset,
    pub pipeline: String,
    pub params: RunParameters,
    /// Passed to both driver and executors
    pub env: BTreeMap<String, String>,
}

impl Job {
    pub fn new(asset: Asset, pipeline: impl Into<String>, params: RunParameters) -> Self {
        Self {
            asset,
            pipeline: pipeline.into(),
            params,
            env: BTreeMap::new(),
        }
    }

    /// Resolves the asset's string parameters over connection defaults
    pub fn resolve(
        asset: Asset,
        pipeline: impl Into<String>,
        defaults: &ConnectionDefaults,
        params: &HashMap<String, String>,
    ) -> Result<Self, RunError> {
        let params = RunParameters::resolve(defaults, params)?;
        Ok(Self::new(asset, pipeline, params))
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

/// Executes jobs against a control plane and object store
///
/// Holds only shared, thread-safe clients, so one runner can drive many
/// jobs concurrently.
#[derive(Clone)]
pub struct JobRunner {
    control_plane: Arc<dyn ControlPlane>,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn LineSink>,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        store: Arc<dyn ObjectStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            control_plane,
            store,
            sink: Arc::new(TracingSink),
            config,
        }
    }

    /// Sends transition and log lines to `sink` instead of `tracing`
    pub fn with_sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs `job` to completion
    ///
    /// Returns `Ok(())` only if the remote run finished successfully.
    pub async fn run(&self, job: &Job, cancel: &CancellationToken) -> Result<(), RunError> {
        let stager = WorkspaceStager::new(Arc::clone(&self.store))
            .with_cleanup_timeout(self.config.cleanup_timeout);

        let workspace = if job.asset.staged {
            match stager
                .prepare(&job.asset, &job.pipeline, job.params.workspace.as_ref())
                .await
            {
                Ok(workspace) => Some(workspace),
                Err(err) => {
                    if let Some(workspace) = &err.workspace {
                        stager.destroy(workspace).await;
                    }
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        let (handle, outcome) = self.submit_and_supervise(job, workspace.as_ref(), cancel).await;
        info!("Run of {} finished: {}", job.asset.name, outcome.label());

        if let Some(handle) = &handle {
            if outcome.requires_remote_cancel() {
                self.cancel_remote(handle).await;
            }
        }
        if let Some(workspace) = &workspace {
            stager.destroy(workspace).await;
        }

        outcome.into_result()
    }

    async fn submit_and_supervise(
        &self,
        job: &Job,
        workspace: Option<&Workspace>,
        cancel: &CancellationToken,
    ) -> (Option<RunHandle>, RunOutcome) {
        let mut supervisor = RunSupervisor::new(
            Arc::clone(&self.control_plane),
            Arc::clone(&self.sink),
            PollTimer::from_config(&self.config),
        );

        let request = submitter::build(&job.params, workspace, &job.env, &job.asset.name);
        let handle = match supervisor.submit(&request).await {
            Ok(handle) => handle,
            Err(err) => return (None, RunOutcome::LocalError(err)),
        };

        let destination = LogDestination::resolve(
            &job.params,
            workspace,
            self.control_plane.as_ref(),
            &handle,
        )
        .await;
        debug!("Reading logs for run {} from {:?}", handle.run_id, destination);
        let mut logs = build_log_consumer(&destination, Arc::clone(&self.store), &handle);

        let outcome = supervisor.supervise(&handle, logs.as_mut(), cancel).await;
        (Some(handle), outcome)
    }

    /// Best-effort cancel; the result is only logged
    async fn cancel_remote(&self, handle: &RunHandle) {
        info!("Error detected, cancelling job run {}", handle.run_id);
        match tokio::time::timeout(
            self.config.cancel_timeout,
            self.control_plane.cancel_job_run(handle),
        )
        .await
        {
            Ok(Ok(())) => debug!("Cancellation of run {} requested", handle.run_id),
            Ok(Err(e)) => debug!("Failed to cancel run {}: {}", handle.run_id, e),
            Err(_) => warn!(
                "Timed out after {:?} cancelling run {}",
                self.config.cancel_timeout, handle.run_id
            ),
        }
    }
}
