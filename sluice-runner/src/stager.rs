//! Workspace stager
//!
//! Uploads a script asset and a zip of its project tree to a run-scoped
//! workspace in the object store, and deletes that workspace once the run is
//! over.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sluice_client::ObjectStore;
use sluice_core::ObjectUri;
use sluice_core::domain::asset::Asset;
use sluice_core::domain::workspace::Workspace;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{StagingError, StagingErrorKind};

/// Marker whose presence identifies the project root
const PROJECT_ROOT_MARKER: &str = ".git";

/// Directories never shipped in the context archive
const SKIPPED_DIRS: &[&str] = &["__pycache__"];

const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Stages and destroys run workspaces
#[derive(Clone)]
pub struct WorkspaceStager {
    store: Arc<dyn ObjectStore>,
    cleanup_timeout: Duration,
}

impl WorkspaceStager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
        }
    }

    /// Bounds how long [`WorkspaceStager::destroy`] may take
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    /// Uploads the entrypoint and packaged project context
    ///
    /// Everything that can fail locally (reading the entrypoint, locating the
    /// project root, packaging) happens before the workspace is allocated.
    /// Upload failures return the allocated workspace inside the error;
    /// nothing uploaded so far is removed here.
    pub async fn prepare(
        &self,
        asset: &Asset,
        pipeline: &str,
        workspace_root: Option<&ObjectUri>,
    ) -> Result<Workspace, StagingError> {
        let workspace_root = workspace_root.ok_or(StagingErrorKind::MissingWorkspaceRoot)?;
        let file_name = asset
            .entrypoint_file_name()
            .ok_or_else(|| StagingErrorKind::InvalidEntrypoint(asset.entrypoint.clone()))?
            .to_string();

        let script = tokio::fs::read(&asset.entrypoint)
            .await
            .map_err(|source| StagingErrorKind::ReadEntrypoint {
                path: asset.entrypoint.clone(),
                source,
            })?;

        let entrypoint = tokio::fs::canonicalize(&asset.entrypoint)
            .await
            .map_err(|source| StagingErrorKind::ReadEntrypoint {
                path: asset.entrypoint.clone(),
                source,
            })?;
        let project_root = find_project_root(&entrypoint)
            .ok_or_else(|| StagingErrorKind::ProjectRootNotFound(entrypoint.clone()))?;

        debug!("Packaging project context from {}", project_root.display());
        let archive = {
            let root = project_root.clone();
            tokio::task::spawn_blocking(move || package_context(&root))
                .await
                .map_err(|e| StagingErrorKind::Packaging {
                    root: project_root.clone(),
                    message: format!("packaging task failed: {}", e),
                })??
        };

        let workspace = Workspace::allocate(workspace_root, pipeline, &file_name);
        info!("Staging {} into {}", asset.name, workspace.root);

        self.upload(&workspace, &workspace.entrypoint, script).await?;
        self.upload(&workspace, &workspace.context, archive).await?;

        Ok(workspace)
    }

    async fn upload(
        &self,
        workspace: &Workspace,
        uri: &ObjectUri,
        body: Vec<u8>,
    ) -> Result<(), StagingError> {
        debug!("Uploading {} ({} bytes)", uri, body.len());
        self.store.put_object(uri, body).await.map_err(|source| {
            StagingError::in_workspace(
                StagingErrorKind::Upload {
                    uri: uri.clone(),
                    source,
                },
                workspace,
            )
        })
    }

    /// Deletes every object below the workspace root
    ///
    /// Never fails: listing and deletion errors are logged and swallowed, and
    /// the whole operation gives up after the cleanup timeout.
    pub async fn destroy(&self, workspace: &Workspace) {
        match tokio::time::timeout(self.cleanup_timeout, self.delete_all(&workspace.root)).await {
            Ok(deleted) => debug!("Deleted {} object(s) below {}", deleted, workspace.root),
            Err(_) => warn!(
                "Timed out after {:?} cleaning up workspace {}",
                self.cleanup_timeout, workspace.root
            ),
        }
    }

    async fn delete_all(&self, root: &ObjectUri) -> usize {
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = match self.store.list_objects(root, continuation.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Failed to list workspace {}: {}", root, e);
                    return deleted;
                }
            };

            for object in &page.objects {
                let uri = root.with_key(object.key.clone());
                match self.store.delete_object(&uri).await {
                    Ok(()) => deleted += 1,
                    Err(e) => debug!("Failed to delete {}: {}", uri, e),
                }
            }

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => return deleted,
            }
        }
    }
}

/// Nearest ancestor directory of `entrypoint` holding a `.git` entry
pub fn find_project_root(entrypoint: &Path) -> Option<PathBuf> {
    entrypoint
        .ancestors()
        .skip(1)
        .find(|dir| dir.join(PROJECT_ROOT_MARKER).exists())
        .map(Path::to_path_buf)
}

/// Zips every regular file below `root`
///
/// Paths are stored relative to `root` with `/` separators, in sorted order.
/// Hidden directories and `__pycache__` are skipped and symlinks are not
/// followed.
pub fn package_context(root: &Path) -> Result<Vec<u8>, StagingErrorKind> {
    let packaging_error = |message: String| StagingErrorKind::Packaging {
        root: root.to_path_buf(),
        message,
    };

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    for entry in walker {
        let entry = entry.map_err(|e| packaging_error(format!("failed to walk project: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| {
                packaging_error(format!("unexpected path {}: {}", entry.path().display(), e))
            })?;
        let name = archive_name(relative);

        let bytes = std::fs::read(entry.path())
            .map_err(|e| {
                packaging_error(format!("failed to read {}: {}", entry.path().display(), e))
            })?;

        zip.start_file(name.as_str(), options)
            .map_err(|e| packaging_error(format!("failed to add {}: {}", name, e)))?;
        zip.write_all(&bytes)
            .map_err(|e| packaging_error(format!("failed to write {}: {}", name, e)))?;
    }

    let buffer = zip
        .finish()
        .map_err(|e| packaging_error(format!("failed to finalize archive: {}", e)))?;
    Ok(buffer.into_inner())
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
