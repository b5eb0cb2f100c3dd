//! macOS handler, delegating to Homebrew.
//!
//! Release assets are never used on Darwin: the lifecycle driver hands
//! install, upgrade, remove and purge to [`ExternalPackager`], and the
//! filesystem layout belongs to Homebrew.

use std::path::Path;

use tracing::{error, info};

use super::handler::{
    ExternalPackager, PlatformHandler, ScriptSource, ServiceAction, UnixLayout,
};
use super::registry::HandlerContext;
use crate::error::{HelperError, HelperResult};

const TAP: &str = "v2ray/v2ray";
const FORMULA: &str = "v2ray-core";

pub struct DarwinHandler {
    ctx: HandlerContext,
}

impl DarwinHandler {
    /// Fails when `brew` is not on the PATH.
    pub fn new(ctx: &HandlerContext) -> HelperResult<Self> {
        if !ctx.runner.exists("brew") {
            return Err(HelperError::UnsupportedPlatform(
                "this tool requires Homebrew, please install Homebrew first".to_string(),
            ));
        }
        Ok(Self { ctx: ctx.clone() })
    }

    fn brew(&self, args: &str) -> HelperResult<()> {
        self.ctx.runner.run(&format!("brew {}", args)).map(|_| ())
    }

    fn managed_by_homebrew() -> HelperError {
        HelperError::UnsupportedPlatform("paths on darwin are managed by Homebrew".to_string())
    }
}

impl PlatformHandler for DarwinHandler {
    fn name(&self) -> &'static str {
        "darwin"
    }

    /// Homebrew refuses to run as root, so nothing is escalated.
    fn gain_privileges(&self) -> HelperResult<()> {
        Ok(())
    }

    fn layout(&self) -> HelperResult<&UnixLayout> {
        Err(Self::managed_by_homebrew())
    }

    fn place_file(&self, _staged: &Path) -> HelperResult<()> {
        Err(Self::managed_by_homebrew())
    }

    fn service_control(&self, action: ServiceAction) -> HelperResult<()> {
        self.brew(&format!("services {} {}", action, FORMULA))
    }

    fn install_control_script(&self, _scripts: &ScriptSource<'_>) -> HelperResult<()> {
        Ok(())
    }

    fn remove_control_script(&self) -> HelperResult<()> {
        Ok(())
    }

    fn auto_start_set(&self, enabled: bool) -> HelperResult<()> {
        self.service_control(if enabled {
            ServiceAction::Enable
        } else {
            ServiceAction::Disable
        })
    }

    fn query_installed_version(&self) -> Option<String> {
        super::unix::query_version(self.ctx.runner.as_ref())
    }

    fn create_service_user(&self) -> HelperResult<()> {
        Ok(())
    }

    fn delete_service_user(&self) -> HelperResult<()> {
        Ok(())
    }

    fn package_manager(&self) -> Option<&dyn ExternalPackager> {
        Some(self)
    }
}

impl ExternalPackager for DarwinHandler {
    fn install(&self) -> HelperResult<()> {
        info!("Install the official tap...");
        self.brew(&format!("tap {}", TAP))?;

        info!("Install v2ray...");
        self.brew(&format!("install {}", FORMULA))?;

        info!("Register v2ray to launch at login...");
        self.service_control(ServiceAction::Start)?;

        info!("Successfully installed v2ray");
        Ok(())
    }

    fn upgrade(&self) -> HelperResult<()> {
        info!("Upgrade v2ray...");
        self.brew(&format!("upgrade {}", FORMULA))?;
        info!("V2ray upgraded");

        info!("Restart v2ray...");
        self.service_control(ServiceAction::Restart)
    }

    fn remove(&self) -> HelperResult<()> {
        info!("Uninstalling v2ray...");
        if let Err(e) = self.brew(&format!("remove {}", FORMULA)) {
            error!("Cannot remove v2ray: {}", e);
        }
        Ok(())
    }

    fn purge(&self) -> HelperResult<()> {
        self.remove()?;
        info!("Untapping {}", TAP);
        self.brew(&format!("untap {}", TAP))
    }
}
