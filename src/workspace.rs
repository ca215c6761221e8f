//! Per-run temporary workspace
//!
//! Each run stages its downloaded archive and the extracted files in
//! `<temp_dir>/autoImport_<run_id>`. The directory exists only between
//! [`Workspace::create`] and [`Workspace::destroy`].

use crate::error::{Error, Result};
use crate::types::{RunId, SourceFile};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the downloaded archive inside the workspace
pub const ARCHIVE_FILE_NAME: &str = "source.zip";

const WORKSPACE_PREFIX: &str = "autoImport_";

/// Exclusively owned workspace directory of one run
#[derive(Debug)]
pub struct Workspace {
    path: Option<PathBuf>,
}

impl Workspace {
    /// Deterministic workspace path for a run id
    pub fn path_for(temp_root: &Path, run_id: &RunId) -> PathBuf {
        temp_root.join(format!("{WORKSPACE_PREFIX}{run_id}"))
    }

    /// Create a fresh, empty workspace
    ///
    /// Leftovers of a crashed run with the same id are removed first.
    pub async fn create(temp_root: &Path, run_id: &RunId) -> Result<Self> {
        let path = Self::path_for(temp_root, run_id);

        remove_dir_if_present(&path).await?;

        tokio::fs::create_dir_all(temp_root)
            .await
            .map_err(|source| Error::Filesystem {
                path: temp_root.to_path_buf(),
                source,
            })?;
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| Error::Filesystem {
                path: path.clone(),
                source,
            })?;

        debug!(%run_id, ?path, "created workspace");
        Ok(Self { path: Some(path) })
    }

    /// Workspace directory
    pub fn path(&self) -> &Path {
        // `path` is only taken by `destroy`, which consumes the workspace
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    /// Where the fetched archive is written
    pub fn archive_path(&self) -> PathBuf {
        self.path().join(ARCHIVE_FILE_NAME)
    }

    /// Where an extracted source file is expected
    pub fn member_path(&self, file: SourceFile) -> PathBuf {
        self.path().join(file.file_name())
    }

    /// Recursively remove the workspace
    ///
    /// A directory that is already gone counts as removed.
    pub async fn destroy(mut self) -> Result<()> {
        let Some(path) = self.path.take() else {
            return Ok(());
        };
        remove_dir_if_present(&path).await?;
        debug!(?path, "removed workspace");
        Ok(())
    }
}

impl Drop for Workspace {
    // Only reached when a run future is dropped before it could clean up
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => debug!(?path, "removed abandoned workspace"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(?path, error = %e, "failed to remove abandoned workspace"),
            }
        }
    }
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Filesystem {
            path: path.to_path_buf(),
            source,
        }),
    }
}
