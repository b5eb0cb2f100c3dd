//! Marker-line editing of `/etc/rc.conf`.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::{HelperError, HelperResult};

/// Variable that enables the rc.d script.
pub const ENABLE_KEY: &str = "v2ray_enable";

/// Line appended to enable autostart.
pub const ENABLE_LINE: &str = "v2ray_enable=\"YES\"";

/// Add or remove the autostart line in `path`.
///
/// Enabling appends [`ENABLE_LINE`] when no line mentions [`ENABLE_KEY`],
/// and rewrites the first such line in place (dropping any others) when it
/// is not already [`ENABLE_LINE`]. Disabling drops every line that mentions
/// the key. Other lines are preserved byte for byte. Returns whether the
/// file changed.
pub fn set_autostart(path: &Path, enabled: bool) -> HelperResult<bool> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(HelperError::io("failed to read", path, e)),
    };

    let markers: Vec<&str> = content.lines().filter(|l| l.contains(ENABLE_KEY)).collect();

    let updated = match (enabled, markers.as_slice()) {
        (true, []) => {
            let mut updated = content.clone();
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(ENABLE_LINE);
            updated.push('\n');
            Some(updated)
        }
        (true, [line]) if line.trim() == ENABLE_LINE => None,
        (true, _) => Some(rewrite_marker(&content)),
        (false, []) => None,
        (false, _) => Some(
            content
                .split_inclusive('\n')
                .filter(|l| !l.contains(ENABLE_KEY))
                .collect(),
        ),
    };

    let Some(updated) = updated else {
        debug!(path = %path.display(), enabled, "autostart already set");
        return Ok(false);
    };

    fs::write(path, updated).map_err(|e| HelperError::io("failed to write", path, e))?;
    debug!(path = %path.display(), enabled, "autostart updated");
    Ok(true)
}

/// Replace the first marker line with [`ENABLE_LINE`] and drop the rest.
fn rewrite_marker(content: &str) -> String {
    let mut replaced = false;
    let mut updated = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        if !line.contains(ENABLE_KEY) {
            updated.push_str(line);
            continue;
        }
        if !replaced {
            updated.push_str(ENABLE_LINE);
            if line.ends_with('\n') {
                updated.push('\n');
            }
            replaced = true;
        }
    }
    updated
}
