use crate::domain::error::HandlerError;
use crate::domain::object_key::ObjectKey;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, error, instrument};

const WORKSPACE_PREFIX: &str = "resize-";

/// Scratch directory owned by one invocation. Removed by `release` on
/// success, and by the inner `TempDir` being dropped on every other exit,
/// cancellation included.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn acquire(root: &Path) -> Result<Workspace, HandlerError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|source| HandlerError::WorkspaceError {
                path: root.display().to_string(),
                source,
            })?;
        debug!("Workspace acquired at {}", dir.path().display());
        Ok(Workspace { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn download_path(&self, key: &ObjectKey) -> PathBuf {
        self.dir.path().join(key.basename())
    }

    pub fn upload_path(&self, key: &ObjectKey) -> PathBuf {
        self.dir.path().join(key.processed_name())
    }

    #[instrument(skip(self, bytes))]
    pub async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), HandlerError> {
        let timer = Instant::now();
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| HandlerError::WorkspaceError {
                path: path.display().to_string(),
                source,
            })?;
        debug!(
            "FS write took {} ms for {} bytes",
            timer.elapsed().as_millis(),
            bytes.len()
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn read_file(&self, path: &Path) -> Result<Vec<u8>, HandlerError> {
        tokio::fs::read(path)
            .await
            .map_err(|source| HandlerError::WorkspaceError {
                path: path.display().to_string(),
                source,
            })
    }

    /// Removes the directory and everything in it, reporting failures that
    /// `Drop` would otherwise swallow.
    pub fn release(self) {
        let path = self.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Workspace released at {}", path.display()),
            Err(err) => error!("Could not remove workspace at {}: {err}", path.display()),
        }
    }
}
