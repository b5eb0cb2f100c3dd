//! Lifecycle actions and their preconditions.
//!
//! Planning is a pure function of the requested action, the installed
//! version and the latest release. Every precondition is checked here,
//! before anything on the host changes.

use std::fmt;

use tracing::info;

use crate::error::{HelperError, HelperResult, Precondition};

/// Action requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleAction {
    Install,
    Upgrade,
    Remove,
    Purge,
    /// Install when absent, upgrade otherwise.
    #[default]
    Auto,
}

impl LifecycleAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Remove => "remove",
            Self::Purge => "purge",
            Self::Auto => "auto",
        }
    }

    /// Whether the action needs the latest release.
    pub fn needs_release(&self) -> bool {
        matches!(self, Self::Install | Self::Upgrade | Self::Auto)
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved, executable action. `Auto` never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Install,
    Upgrade,
    Remove,
    Purge,
}

impl PlannedAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Remove => "remove",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the host reports as installed. Never cached across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledState {
    pub installed_version: Option<String>,
}

impl InstalledState {
    pub fn new(installed_version: Option<String>) -> Self {
        Self { installed_version }
    }

    pub fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }
}

/// Override flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Bypass the installed / already-latest checks.
    pub force: bool,
    /// Confirms a purge.
    pub sure: bool,
}

/// Reject an unconfirmed purge.
///
/// Runs before platform detection so that nothing else happens.
pub fn check_confirmation(action: LifecycleAction, options: LifecycleOptions) -> HelperResult<()> {
    if action == LifecycleAction::Purge && !options.sure {
        return Err(HelperError::PreconditionViolation(
            Precondition::ConfirmationRequired,
        ));
    }
    Ok(())
}

/// Check the preconditions that depend only on the installed state.
///
/// These do not need the latest release, so the driver runs them before
/// contacting the release endpoint.
pub fn check_installed_state(
    action: LifecycleAction,
    state: &InstalledState,
    options: LifecycleOptions,
) -> HelperResult<()> {
    let installed = state.is_installed();

    match action {
        LifecycleAction::Install if installed && !options.force => Err(
            HelperError::PreconditionViolation(Precondition::AlreadyInstalled),
        ),
        // force cannot upgrade something that is not there
        LifecycleAction::Upgrade if !installed => {
            Err(HelperError::PreconditionViolation(Precondition::NotInstalled))
        }
        LifecycleAction::Remove if !installed && !options.force => {
            Err(HelperError::PreconditionViolation(Precondition::NotInstalled))
        }
        LifecycleAction::Purge => check_confirmation(action, options),
        _ => Ok(()),
    }
}

/// Resolve `action` against the host state.
///
/// # Arguments
///
/// * `action` - Requested action
/// * `state` - Installed version reported by the host
/// * `latest` - Latest release tag; only consulted for upgrades
/// * `options` - `force` / `sure` flags
///
/// # Errors
///
/// `PreconditionViolation` or `AlreadyLatest` as described on each action.
pub fn plan(
    action: LifecycleAction,
    state: &InstalledState,
    latest: Option<&str>,
    options: LifecycleOptions,
) -> HelperResult<PlannedAction> {
    check_installed_state(action, state, options)?;
    let installed = state.installed_version.as_deref();

    match action {
        LifecycleAction::Install => Ok(PlannedAction::Install),
        LifecycleAction::Upgrade => plan_upgrade(installed, latest, options),
        LifecycleAction::Remove => Ok(PlannedAction::Remove),
        LifecycleAction::Purge => Ok(PlannedAction::Purge),
        LifecycleAction::Auto => match installed {
            None => Ok(PlannedAction::Install),
            Some(_) => plan_upgrade(installed, latest, options),
        },
    }
}

fn plan_upgrade(
    installed: Option<&str>,
    latest: Option<&str>,
    options: LifecycleOptions,
) -> HelperResult<PlannedAction> {
    let installed =
        installed.ok_or(HelperError::PreconditionViolation(Precondition::NotInstalled))?;

    if latest == Some(installed) {
        if !options.force {
            return Err(HelperError::AlreadyLatest {
                version: installed.to_string(),
            });
        }
        info!("Force reinstalling {}", installed);
    }
    Ok(PlannedAction::Upgrade)
}
