//! Behaviour shared by the BSD handlers.

use tracing::warn;

use super::handler::{ScriptSource, UnixLayout, SERVICE_USER};
use super::rc_conf;
use super::registry::HandlerContext;
use super::unix;
use crate::error::HelperResult;

/// Toggle `v2ray_enable` in the layout's rc.conf.
pub fn auto_start_set(layout: &UnixLayout, enabled: bool) -> HelperResult<()> {
    match &layout.rc_conf {
        Some(path) => rc_conf::set_autostart(path, enabled).map(|_| ()),
        None => {
            warn!("No rc.conf configured, autostart unchanged");
            Ok(())
        }
    }
}

/// Install the rc.d script from `relative` and create the pid directory.
pub fn install_rc_script(
    ctx: &HandlerContext,
    layout: &UnixLayout,
    scripts: &ScriptSource<'_>,
    relative: &str,
) -> HelperResult<()> {
    unix::install_script(scripts, relative, &layout.unit_path, unix::SCRIPT_MODE)?;
    if let Some(pid_dir) = &layout.pid_dir {
        unix::make_owned_dir(pid_dir, ctx.accounts.as_ref(), SERVICE_USER)?;
    }
    Ok(())
}
