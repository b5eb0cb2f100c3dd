//! Zip extraction for release archives.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{HelperError, HelperResult};

/// Extract every entry of `archive` into `output`.
///
/// # Returns
///
/// The single top-level directory when all entries share one, otherwise
/// `output` itself.
///
/// # Errors
///
/// Entries that would escape `output` abort the extraction.
pub fn extract_all(archive: &Path, output: &Path) -> HelperResult<PathBuf> {
    let failed = |reason: String| HelperError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive).map_err(|e| HelperError::io("failed to open", archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;

    fs::create_dir_all(output)
        .map_err(|e| HelperError::io("failed to create directory", output, e))?;

    let mut roots: Vec<PathBuf> = Vec::new();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| failed(e.to_string()))?;

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| failed(format!("unsafe entry name {}", entry.name())))?;
        let target = output.join(&relative);

        if let Some(Component::Normal(first)) = relative.components().next() {
            let is_root_file = !entry.is_dir() && relative.components().count() == 1;
            let root = if is_root_file {
                // A file at top level means there is no common directory.
                PathBuf::new()
            } else {
                PathBuf::from(first)
            };
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| HelperError::io("failed to create directory", &target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HelperError::io("failed to create directory", parent, e))?;
        }

        let mut out =
            File::create(&target).map_err(|e| HelperError::io("failed to create", &target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| HelperError::io("failed to write", &target, e))?;
        if let Some(mode) = entry.unix_mode() {
            apply_mode(&target, mode)?;
        }
        debug!(path = %target.display(), "extracted");
    }

    match roots.as_slice() {
        [root] if !root.as_os_str().is_empty() => Ok(output.join(root)),
        _ => Ok(output.to_path_buf()),
    }
}

/// Apply the permission bits stored in the archive.
fn apply_mode(path: &Path, mode: u32) -> HelperResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
            .map_err(|e| HelperError::io("failed to set permissions on", path, e))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}
