//! The capability set every platform variant provides.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::download::ArtifactFetcher;
use crate::error::{HelperError, HelperResult};

use super::unix;

/// Executables shipped in the release bundle.
pub const EXECUTABLES: [&str; 2] = ["v2ray", "v2ctl"];

/// Name of the dedicated service user and group.
pub const SERVICE_USER: &str = "v2ray";

/// Actions forwarded to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl ServiceAction {
    /// Verb understood by systemctl, service(8), rcctl and brew services.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed filesystem locations of one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixLayout {
    /// Installed bundle directory.
    pub target_path: PathBuf,
    /// Directory holding the executable symlinks.
    pub base_path: PathBuf,
    /// Configuration directory.
    pub config_dir: PathBuf,
    /// Installed service-manager unit or rc.d script.
    pub unit_path: PathBuf,
    /// Runtime directory for the pid file, where the rc.d script needs one.
    pub pid_dir: Option<PathBuf>,
    /// Home directory of the service user.
    pub user_home: PathBuf,
    /// System startup file edited for autostart, where the platform uses one.
    pub rc_conf: Option<PathBuf>,
}

impl UnixLayout {
    /// Move every absolute path below `root`.
    ///
    /// Used to run handlers against a scratch tree.
    pub fn rooted_at(&self, root: &Path) -> Self {
        let reroot = |p: &Path| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            target_path: reroot(&self.target_path),
            base_path: reroot(&self.base_path),
            config_dir: reroot(&self.config_dir),
            unit_path: reroot(&self.unit_path),
            pid_dir: self.pid_dir.as_deref().map(reroot),
            user_home: reroot(&self.user_home),
            rc_conf: self.rc_conf.as_deref().map(reroot),
        }
    }
}

/// Trusted location of control scripts and the config template.
pub struct ScriptSource<'a> {
    fetcher: &'a dyn ArtifactFetcher,
    base_url: &'a str,
}

impl<'a> ScriptSource<'a> {
    pub fn new(fetcher: &'a dyn ArtifactFetcher, base_url: &'a str) -> Self {
        Self { fetcher, base_url }
    }

    /// Download `<base>/<relative>` into the scratch directory as `dest_name`.
    pub fn fetch(&self, relative: &str, dest_name: &str) -> HelperResult<PathBuf> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative.trim_start_matches('/')
        );
        self.fetcher.fetch(&url, dest_name)
    }
}

/// Installs through an external package manager instead of release assets.
pub trait ExternalPackager {
    fn install(&self) -> HelperResult<()>;
    fn upgrade(&self) -> HelperResult<()>;
    fn remove(&self) -> HelperResult<()>;
    fn purge(&self) -> HelperResult<()>;
}

/// Everything that differs between operating systems.
///
/// One implementation is selected per run by
/// [`HandlerRegistry`](super::HandlerRegistry). The provided methods work
/// from [`layout`](Self::layout) and fail wherever the layout does.
pub trait PlatformHandler {
    /// Short handler name for logs.
    fn name(&self) -> &'static str;

    /// Ensure the process runs privileged, re-executing it if needed.
    fn gain_privileges(&self) -> HelperResult<()>;

    /// Filesystem locations of this platform.
    fn layout(&self) -> HelperResult<&UnixLayout>;

    /// Replace the installed bundle with `staged` and normalise permissions.
    fn place_file(&self, staged: &Path) -> HelperResult<()>;

    /// Forward an action to the service manager.
    fn service_control(&self, action: ServiceAction) -> HelperResult<()>;

    /// Download and install the service-manager unit.
    fn install_control_script(&self, scripts: &ScriptSource<'_>) -> HelperResult<()>;

    /// Delete the unit and any runtime directories it uses.
    fn remove_control_script(&self) -> HelperResult<()>;

    /// Toggle boot-time activation.
    fn auto_start_set(&self, enabled: bool) -> HelperResult<()>;

    /// Version reported by the installed binary; `None` if not installed.
    fn query_installed_version(&self) -> Option<String>;

    /// Create the service group and user when absent.
    fn create_service_user(&self) -> HelperResult<()>;

    /// Delete the service user and group when present.
    fn delete_service_user(&self) -> HelperResult<()>;

    /// Package manager that owns the installation, if any.
    fn package_manager(&self) -> Option<&dyn ExternalPackager> {
        None
    }

    fn executables(&self) -> &[&'static str] {
        &EXECUTABLES
    }

    fn config_dir(&self) -> HelperResult<&Path> {
        Ok(&self.layout()?.config_dir)
    }

    fn base_path(&self) -> HelperResult<&Path> {
        Ok(&self.layout()?.base_path)
    }

    fn target_path(&self) -> HelperResult<&Path> {
        Ok(&self.layout()?.target_path)
    }

    /// Symlink every executable from the base path into the bundle.
    fn link_executables(&self) -> HelperResult<()> {
        let layout = self.layout()?;
        unix::link_executables(&layout.base_path, &layout.target_path, self.executables())
    }

    /// Delete the executable symlinks.
    fn unlink_executables(&self) -> HelperResult<()> {
        unix::unlink_executables(&self.layout()?.base_path, self.executables())
    }

    /// Delete the installed bundle.
    fn remove_installation(&self) -> HelperResult<()> {
        unix::remove_if_exists(&self.layout()?.target_path).map(|_| ())
    }

    /// Delete the configuration directory.
    fn remove_config(&self) -> HelperResult<()> {
        unix::remove_if_exists(&self.layout()?.config_dir).map(|_| ())
    }
}

/// Error returned by every operation of an unsupported platform.
pub fn unsupported(platform: &str) -> HelperError {
    HelperError::UnsupportedPlatform(format!("{} is not supported", platform))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_action_verbs() {
        assert_eq!(ServiceAction::Start.as_str(), "start");
        assert_eq!(ServiceAction::Restart.to_string(), "restart");
    }

    #[test]
    fn test_rooted_layout() {
        let layout = UnixLayout {
            target_path: PathBuf::from("/opt/v2ray"),
            base_path: PathBuf::from("/usr/bin"),
            config_dir: PathBuf::from("/etc/v2ray"),
            unit_path: PathBuf::from("/etc/systemd/system/v2ray.service"),
            pid_dir: None,
            user_home: PathBuf::from("/var/lib/v2ray"),
            rc_conf: Some(PathBuf::from("/etc/rc.conf")),
        };

        let rooted = layout.rooted_at(Path::new("/tmp/root"));
        assert_eq!(rooted.target_path, PathBuf::from("/tmp/root/opt/v2ray"));
        assert_eq!(rooted.rc_conf, Some(PathBuf::from("/tmp/root/etc/rc.conf")));
        assert_eq!(rooted.pid_dir, None);
    }
}
