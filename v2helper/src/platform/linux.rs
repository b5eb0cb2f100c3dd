//! Linux handler (systemd).

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::accounts::{self, AccountTool};
use super::handler::{PlatformHandler, ScriptSource, ServiceAction, UnixLayout, SERVICE_USER};
use super::privilege;
use super::registry::HandlerContext;
use super::unix;
use crate::error::HelperResult;

/// Present on hosts booted with systemd.
const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// Unit file below the script base.
const UNIT_SCRIPT: &str = "misc/v2ray.service";

/// Linux paths.
pub fn default_layout() -> UnixLayout {
    UnixLayout {
        target_path: PathBuf::from("/opt/v2ray"),
        base_path: PathBuf::from("/usr/bin"),
        config_dir: PathBuf::from("/etc/v2ray"),
        unit_path: PathBuf::from("/etc/systemd/system/v2ray.service"),
        pid_dir: None,
        user_home: PathBuf::from("/var/lib/v2ray"),
        rc_conf: None,
    }
}

/// Handler for systemd-based Linux.
///
/// Hosts without systemd are "legacy": service control and unit
/// installation are skipped with a log line.
pub struct LinuxHandler {
    ctx: HandlerContext,
    layout: UnixLayout,
    legacy: bool,
}

impl LinuxHandler {
    pub fn new(ctx: &HandlerContext) -> Self {
        let legacy = !Path::new(SYSTEMD_RUNTIME_DIR).is_dir();
        Self::with_layout(ctx, default_layout(), legacy)
    }

    pub fn with_layout(ctx: &HandlerContext, layout: UnixLayout, legacy: bool) -> Self {
        if legacy {
            warn!("You're running an outdated linux version, some operations will not be supported");
        }
        Self {
            ctx: ctx.clone(),
            layout,
            legacy,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }
}

impl PlatformHandler for LinuxHandler {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn gain_privileges(&self) -> HelperResult<()> {
        privilege::ensure_privileged(self.ctx.privilege.as_ref())
    }

    fn layout(&self) -> HelperResult<&UnixLayout> {
        Ok(&self.layout)
    }

    fn place_file(&self, staged: &Path) -> HelperResult<()> {
        unix::place_tree(staged, &self.layout.target_path, self.executables())
    }

    fn service_control(&self, action: ServiceAction) -> HelperResult<()> {
        if self.legacy {
            info!("No systemd, skipping `{}`", action);
            return Ok(());
        }
        self.ctx
            .runner
            .run(&format!("systemctl {} v2ray", action))
            .map(|_| ())
    }

    fn install_control_script(&self, scripts: &ScriptSource<'_>) -> HelperResult<()> {
        if self.legacy {
            info!("No systemd, skipping unit installation");
            return Ok(());
        }
        unix::install_script(scripts, UNIT_SCRIPT, &self.layout.unit_path, 0o644)?;
        self.ctx.runner.run("systemctl daemon-reload").map(|_| ())
    }

    fn remove_control_script(&self) -> HelperResult<()> {
        unix::remove_if_exists(&self.layout.unit_path).map(|_| ())
    }

    fn auto_start_set(&self, enabled: bool) -> HelperResult<()> {
        self.service_control(if enabled {
            ServiceAction::Enable
        } else {
            ServiceAction::Disable
        })
    }

    fn query_installed_version(&self) -> Option<String> {
        unix::query_version(self.ctx.runner.as_ref())
    }

    fn create_service_user(&self) -> HelperResult<()> {
        accounts::ensure_account(
            self.ctx.runner.as_ref(),
            self.ctx.accounts.as_ref(),
            AccountTool::SHADOW,
            SERVICE_USER,
            &self.layout.user_home,
        )
    }

    fn delete_service_user(&self) -> HelperResult<()> {
        accounts::delete_account(
            self.ctx.runner.as_ref(),
            self.ctx.accounts.as_ref(),
            AccountTool::SHADOW,
            SERVICE_USER,
            &self.layout.user_home,
        )
    }
}
