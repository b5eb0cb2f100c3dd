//! Filesystem glue shared by the Unix-like handlers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::accounts::AccountDatabase;
use super::handler::ScriptSource;
use crate::command::CommandRunner;
use crate::error::{HelperError, HelperResult};
use crate::release::parse_version_output;

const DIR_MODE: u32 = 0o755;
const EXECUTABLE_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Mode of installed rc.d scripts.
pub const SCRIPT_MODE: u32 = 0o555;

/// Remove a file, symlink or directory tree.
///
/// Returns whether anything was removed.
pub fn remove_if_exists(path: &Path) -> HelperResult<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "does not exist, ignored");
            return Ok(false);
        }
        Err(e) => return Err(HelperError::io("failed to inspect", path, e)),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| HelperError::io("failed to remove", path, e))?;

    debug!(path = %path.display(), "removed");
    Ok(true)
}

/// `<path>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Install the tree at `staged` as `target`.
///
/// The tree is copied to `<target>.staged` and normalised there, the current
/// target is moved to `<target>.old`, and the staged tree renamed into
/// place. If that rename fails the old tree is restored. The old tree is
/// deleted only after the swap.
pub fn place_tree(staged: &Path, target: &Path, executables: &[&str]) -> HelperResult<()> {
    let staging = sibling(target, "staged");
    let old = sibling(target, "old");

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| HelperError::io("failed to create directory", parent, e))?;
    }

    remove_if_exists(&staging)?;
    copy_tree(staged, &staging)?;
    normalize_permissions(&staging, executables)?;

    remove_if_exists(&old)?;
    let had_previous = fs::symlink_metadata(target).is_ok();
    if had_previous {
        fs::rename(target, &old).map_err(|e| HelperError::io("failed to move aside", target, e))?;
    }

    if let Err(e) = fs::rename(&staging, target) {
        if had_previous {
            if let Err(restore) = fs::rename(&old, target) {
                warn!("Failed to restore {}: {}", target.display(), restore);
            }
        }
        remove_if_exists(&staging).ok();
        return Err(HelperError::io("failed to move into place", target, e));
    }
    debug!(from = %staged.display(), to = %target.display(), "placed");

    remove_if_exists(&old)?;
    Ok(())
}

/// Recursively copy `from` to `to`.
pub fn copy_tree(from: &Path, to: &Path) -> HelperResult<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            HelperError::io("failed to walk", &path, e.into())
        })?;

        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| HelperError::io("failed to create directory", &dest, e))?;
        } else {
            fs::copy(entry.path(), &dest)
                .map_err(|e| HelperError::io("failed to copy", entry.path(), e))?;
        }
    }
    Ok(())
}

/// Set directories to 0755, listed executables to 0755 and other files to 0644.
pub fn normalize_permissions(root: &Path, executables: &[&str]) -> HelperResult<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            HelperError::io("failed to walk", &path, e.into())
        })?;

        let mode = if entry.file_type().is_dir() {
            DIR_MODE
        } else if entry.file_type().is_file() {
            let name = entry.file_name().to_string_lossy();
            if executables.iter().any(|e| *e == name) {
                EXECUTABLE_MODE
            } else {
                FILE_MODE
            }
        } else {
            continue;
        };

        set_mode(entry.path(), mode)?;
        debug!(path = %entry.path().display(), mode = format_args!("{:o}", mode), "set permission");
    }
    Ok(())
}

/// chmod.
pub fn set_mode(path: &Path, mode: u32) -> HelperResult<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| HelperError::io("failed to chmod", path, e))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// Point `<base>/<name>` at `<target>/<name>` for every executable.
pub fn link_executables(base: &Path, target: &Path, executables: &[&str]) -> HelperResult<()> {
    fs::create_dir_all(base).map_err(|e| HelperError::io("failed to create directory", base, e))?;

    for name in executables {
        let link = base.join(name);
        remove_if_exists(&link)?;
        symlink(&target.join(name), &link)?;
        debug!(link = %link.display(), "symlink created");
    }
    Ok(())
}

/// Remove `<base>/<name>` symlinks. Regular files are left alone.
pub fn unlink_executables(base: &Path, executables: &[&str]) -> HelperResult<()> {
    for name in executables {
        let link = base.join(name);
        match fs::symlink_metadata(&link) {
            Ok(m) if m.file_type().is_symlink() => {
                fs::remove_file(&link).map_err(|e| HelperError::io("failed to remove", &link, e))?;
                debug!(link = %link.display(), "symlink removed");
            }
            Ok(_) => warn!("{} is not a symlink, left in place", link.display()),
            Err(_) => {}
        }
    }
    Ok(())
}

fn symlink(original: &Path, link: &Path) -> HelperResult<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(original, link)
            .map_err(|e| HelperError::io("failed to create symlink", link, e))
    }
    #[cfg(not(unix))]
    {
        let _ = original;
        Err(HelperError::UnsupportedPlatform(format!(
            "symlinks unavailable for {}",
            link.display()
        )))
    }
}

/// Move a file, copying when `from` and `to` are on different filesystems.
pub fn move_file(from: &Path, to: &Path) -> HelperResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| HelperError::io("failed to create directory", parent, e))?;
    }

    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| HelperError::io("failed to copy", from, e))?;
    fs::remove_file(from).map_err(|e| HelperError::io("failed to remove", from, e))?;
    Ok(())
}

/// Fetch `relative` from the script source and install it at `dest`.
pub fn install_script(
    scripts: &ScriptSource<'_>,
    relative: &str,
    dest: &Path,
    mode: u32,
) -> HelperResult<()> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "script".to_string());

    let fetched = scripts.fetch(relative, &name)?;
    move_file(&fetched, dest)?;
    set_mode(dest, mode)?;
    debug!(path = %dest.display(), "control script installed");
    Ok(())
}

/// Create `path` with mode 0755, owned by `user`.
pub fn make_owned_dir(path: &Path, accounts: &dyn AccountDatabase, user: &str) -> HelperResult<()> {
    fs::create_dir_all(path).map_err(|e| HelperError::io("failed to create directory", path, e))?;
    set_mode(path, DIR_MODE)?;

    match accounts.ids(user) {
        Some((uid, gid)) => chown(path, uid, gid)?,
        None => warn!("User {} not found, {} stays owned by root", user, path.display()),
    }
    Ok(())
}

fn chown(path: &Path, uid: u32, gid: u32) -> HelperResult<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
            .map_err(|e| HelperError::io("failed to chown", path, e))?;
        debug!(path = %path.display(), uid, gid, "ownership changed");
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = (path, uid, gid);
        Ok(())
    }
}

/// Ask the installed binary for its version.
///
/// Any failure means "not installed".
pub fn query_version(runner: &dyn CommandRunner) -> Option<String> {
    match runner.run("v2ray --version") {
        Ok(output) => parse_version_output(&output),
        Err(e) => {
            debug!("version query failed: {}", e);
            None
        }
    }
}
