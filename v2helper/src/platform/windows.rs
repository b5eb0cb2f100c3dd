//! Windows placeholder.
//!
//! Registered so dispatch treats every family alike; every operation fails
//! with `UnsupportedPlatform`.

use std::path::Path;

use super::handler::{unsupported, PlatformHandler, ScriptSource, ServiceAction, UnixLayout};
use crate::error::HelperResult;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsHandler;

impl PlatformHandler for WindowsHandler {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn gain_privileges(&self) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn layout(&self) -> HelperResult<&UnixLayout> {
        Err(unsupported(self.name()))
    }

    fn place_file(&self, _staged: &Path) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn service_control(&self, _action: ServiceAction) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn install_control_script(&self, _scripts: &ScriptSource<'_>) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn remove_control_script(&self) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn auto_start_set(&self, _enabled: bool) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn query_installed_version(&self) -> Option<String> {
        None
    }

    fn create_service_user(&self) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }

    fn delete_service_user(&self) -> HelperResult<()> {
        Err(unsupported(self.name()))
    }
}
