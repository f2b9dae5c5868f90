//! Scoped scratch directory.

use crate::LaunchError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name prefix of every scratch directory.
const SCRATCH_PREFIX: &str = "sfx.";

/// A uniquely named temporary directory that is removed when dropped.
///
/// Removal happens on every exit path that unwinds or returns normally:
/// success, errors propagated with `?`, panics and dropped futures.
///
/// # Example
///
/// ```rust
/// use sfx_installer::ScratchDir;
///
/// let scratch = ScratchDir::create(None)?;
/// let path = scratch.path().to_path_buf();
/// assert!(path.is_dir());
/// drop(scratch);
/// assert!(!path.exists());
/// # Ok::<(), sfx_installer::LaunchError>(())
/// ```
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create a scratch directory under `root`, or under the platform temp
    /// directory (`TMPDIR`) when `root` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Scratch` if the directory cannot be created.
    pub fn create(root: Option<&Path>) -> Result<Self, LaunchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| LaunchError::Scratch {
            message: match root {
                Some(root) => format!("{}: {e}", root.display()),
                None => e.to_string(),
            },
        })?;

        // Absolute, so the installer path stays valid once it runs elsewhere.
        let path = std::fs::canonicalize(dir.path()).unwrap_or_else(|_| dir.path().to_path_buf());
        debug!(scratch_dir = %path.display(), "Created scratch directory");
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    /// Path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while deleting the tree.
    pub fn close(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }

    /// Disarm removal and hand the directory over to the caller.
    pub fn keep(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        self.path.clone()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(scratch_dir = %self.path.display(), "Failed to remove scratch directory: {e}");
            }
        }
    }
}
