//! Process-wide scratch directory.
//!
//! The directory is wiped when acquired and again when the guard drops, so
//! every exit path (success, error, unwinding) leaves nothing behind. The
//! interrupt handler calls [`wipe`] directly since `Drop` does not run on
//! `process::exit`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{HelperError, HelperResult};

/// Directory name below the system temp directory.
pub const SCRATCH_NAME: &str = "v2helper";

/// Default scratch location, `<temp>/v2helper`.
pub fn default_path() -> PathBuf {
    std::env::temp_dir().join(SCRATCH_NAME)
}

/// Remove `path` recursively; a missing path is not an error.
pub fn wipe(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "scratch directory removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Scoped scratch directory guard.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Wipe and recreate `path`.
    pub fn acquire(path: impl Into<PathBuf>) -> HelperResult<Self> {
        let path = path.into();

        wipe(&path).map_err(|e| HelperError::io("failed to clean", &path, e))?;
        fs::create_dir_all(&path)
            .map_err(|e| HelperError::io("failed to create directory", &path, e))?;
        debug!(path = %path.display(), "scratch directory ready");

        Ok(Self { path })
    }

    /// Location of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = wipe(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
