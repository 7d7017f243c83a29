//! Asset domain types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The unit of work handed to the engine
///
/// Resolved by the caller from the pipeline definition. `staged` says whether
/// the entrypoint and its project tree must be uploaded to a run workspace
/// before submission (script assets) or whether the entrypoint already lives
/// in the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub entrypoint: PathBuf,
    pub staged: bool,
}

impl Asset {
    pub fn new(name: impl Into<String>, entrypoint: impl Into<PathBuf>, staged: bool) -> Self {
        Self {
            name: name.into(),
            entrypoint: entrypoint.into(),
            staged,
        }
    }

    /// File name of the entrypoint, if the path has one
    pub fn entrypoint_file_name(&self) -> Option<&str> {
        self.entrypoint.file_name().and_then(|name| name.to_str())
    }
}
