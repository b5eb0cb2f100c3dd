//! FreeBSD handler (rc.d + service(8)).

use std::path::{Path, PathBuf};

use super::accounts::{self, AccountTool};
use super::bsd;
use super::handler::{PlatformHandler, ScriptSource, ServiceAction, UnixLayout, SERVICE_USER};
use super::privilege;
use super::registry::HandlerContext;
use super::unix;
use crate::error::HelperResult;

const RC_SCRIPT: &str = "misc/v2ray.freebsd";

pub fn default_layout() -> UnixLayout {
    UnixLayout {
        target_path: PathBuf::from("/opt/v2ray"),
        base_path: PathBuf::from("/usr/local/bin"),
        config_dir: PathBuf::from("/usr/local/etc/v2ray"),
        unit_path: PathBuf::from("/usr/local/etc/rc.d/v2ray"),
        pid_dir: Some(PathBuf::from("/var/run/v2ray")),
        user_home: PathBuf::from("/var/lib/v2ray"),
        rc_conf: Some(PathBuf::from("/etc/rc.conf")),
    }
}

pub struct FreeBsdHandler {
    ctx: HandlerContext,
    layout: UnixLayout,
}

impl FreeBsdHandler {
    pub fn new(ctx: &HandlerContext) -> Self {
        Self::with_layout(ctx, default_layout())
    }

    pub fn with_layout(ctx: &HandlerContext, layout: UnixLayout) -> Self {
        Self {
            ctx: ctx.clone(),
            layout,
        }
    }
}

impl PlatformHandler for FreeBsdHandler {
    fn name(&self) -> &'static str {
        "freebsd"
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
        match action {
            // rc.conf owns activation on FreeBSD
            ServiceAction::Enable => self.auto_start_set(true),
            ServiceAction::Disable => self.auto_start_set(false),
            _ => self
                .ctx
                .runner
                .run(&format!("service v2ray {}", action))
                .map(|_| ()),
        }
    }

    fn install_control_script(&self, scripts: &ScriptSource<'_>) -> HelperResult<()> {
        bsd::install_rc_script(&self.ctx, &self.layout, scripts, RC_SCRIPT)
    }

    fn remove_control_script(&self) -> HelperResult<()> {
        unix::remove_if_exists(&self.layout.unit_path)?;
        if let Some(pid_dir) = &self.layout.pid_dir {
            unix::remove_if_exists(pid_dir)?;
        }
        Ok(())
    }

    fn auto_start_set(&self, enabled: bool) -> HelperResult<()> {
        bsd::auto_start_set(&self.layout, enabled)
    }

    fn query_installed_version(&self) -> Option<String> {
        unix::query_version(self.ctx.runner.as_ref())
    }

    fn create_service_user(&self) -> HelperResult<()> {
        accounts::ensure_account(
            self.ctx.runner.as_ref(),
            self.ctx.accounts.as_ref(),
            AccountTool::PW,
            SERVICE_USER,
            &self.layout.user_home,
        )
    }

    fn delete_service_user(&self) -> HelperResult<()> {
        accounts::delete_account(
            self.ctx.runner.as_ref(),
            self.ctx.accounts.as_ref(),
            AccountTool::PW,
            SERVICE_USER,
            &self.layout.user_home,
        )
    }
}
