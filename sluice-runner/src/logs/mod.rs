//! Remote log consumers
//!
//! A consumer is picked once per run from the first resolvable destination:
//! an explicit log URI, the workspace's shared logs path, the application's
//! own monitoring configuration, or nothing at all.

mod noop;
mod object;

pub use noop::NoopLogConsumer;
pub use object::ObjectLogConsumer;

use std::sync::Arc;

use async_trait::async_trait;
use sluice_client::{ControlPlane, ObjectStore};
use sluice_core::ObjectUri;
use sluice_core::domain::log::LogLine;
use sluice_core::domain::params::RunParameters;
use sluice_core::domain::run::RunHandle;
use sluice_core::domain::workspace::Workspace;
use tracing::debug;

/// Incremental reader over a run's remote log output
#[async_trait]
pub trait LogConsumer: Send {
    /// Lines produced since the previous call
    ///
    /// Never returns a line twice and never fails; a source that does not
    /// exist yet just yields nothing.
    async fn next_batch(&mut self) -> Vec<LogLine>;

    /// Final read once the run is terminal
    ///
    /// Like [`LogConsumer::next_batch`], but also releases a trailing line
    /// still waiting for its newline.
    async fn drain(&mut self) -> Vec<LogLine> {
        self.next_batch().await
    }
}

/// Where a run's logs are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Set through the asset's `logs` parameter
    Explicit(ObjectUri),
    /// Shared logs path of the staged workspace
    Workspace(ObjectUri),
    /// Monitoring destination configured on the application
    Application(ObjectUri),
    None,
}

impl LogDestination {
    /// Picks the destination in priority order
    ///
    /// The application lookup only happens when neither of the local
    /// candidates applies; a failed lookup means no logs.
    pub async fn resolve(
        params: &RunParameters,
        workspace: Option<&Workspace>,
        control_plane: &dyn ControlPlane,
        handle: &RunHandle,
    ) -> Self {
        if let Some(uri) = &params.logs {
            return LogDestination::Explicit(uri.clone());
        }
        if let Some(workspace) = workspace {
            return LogDestination::Workspace(workspace.logs.clone());
        }

        let application = match control_plane.get_application(&handle.application_id).await {
            Ok(application) => application,
            Err(e) => {
                debug!("Failed to look up application {}: {}", handle.application_id, e);
                return LogDestination::None;
            }
        };

        match application.default_log_uri().map(ObjectUri::parse) {
            Some(Ok(uri)) => LogDestination::Application(uri),
            Some(Err(e)) => {
                debug!("Ignoring application log destination: {}", e);
                LogDestination::None
            }
            None => LogDestination::None,
        }
    }

    pub fn uri(&self) -> Option<&ObjectUri> {
        match self {
            LogDestination::Explicit(uri)
            | LogDestination::Workspace(uri)
            | LogDestination::Application(uri) => Some(uri),
            LogDestination::None => None,
        }
    }
}

/// Creates the consumer matching `destination`
pub fn build_log_consumer(
    destination: &LogDestination,
    store: Arc<dyn ObjectStore>,
    handle: &RunHandle,
) -> Box<dyn LogConsumer> {
    match destination.uri() {
        Some(uri) => Box::new(ObjectLogConsumer::new(store, uri, handle)),
        None => Box::new(NoopLogConsumer),
    }
}
