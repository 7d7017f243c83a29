//! Workspace domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ObjectUri;

/// Name of the packaged project archive inside a workspace
pub const CONTEXT_ARCHIVE: &str = "context.zip";

/// Directory below the workspace root used as the default log sink
pub const LOGS_DIR: &str = "logs";

/// Run-scoped staging location in the object store
///
/// Layout:
/// ```text
/// {workspace_root}/{pipeline}/{run_id}/{entrypoint_file}
/// {workspace_root}/{pipeline}/{run_id}/context.zip
/// {workspace_root}/logs/...
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Unique per run; everything below it is deleted after the run
    pub root: ObjectUri,
    pub entrypoint: ObjectUri,
    pub context: ObjectUri,
    /// Shared log sink, deliberately outside `root`
    pub logs: ObjectUri,
}

impl Workspace {
    /// Derives the URIs for a fresh run below `workspace_root`
    ///
    /// The run identifier is a UUIDv7, so run directories sort by creation time.
    pub fn allocate(workspace_root: &ObjectUri, pipeline: &str, entrypoint_file: &str) -> Self {
        Self::with_run_id(workspace_root, pipeline, &Uuid::now_v7().to_string(), entrypoint_file)
    }

    pub fn with_run_id(
        workspace_root: &ObjectUri,
        pipeline: &str,
        run_id: &str,
        entrypoint_file: &str,
    ) -> Self {
        let root = workspace_root.join(pipeline).join(run_id);
        Self {
            entrypoint: root.join(entrypoint_file),
            context: root.join(CONTEXT_ARCHIVE),
            logs: workspace_root.join(LOGS_DIR),
            root,
        }
    }
}
