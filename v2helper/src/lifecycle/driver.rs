//! Runs one lifecycle action against the selected platform handler.
//!
//! The driver works through these stages:
//! 1. Query the installed version
//! 2. Check the preconditions that need no release metadata
//! 3. Resolve the latest release (install / upgrade / auto only)
//! 4. Plan the action
//! 5. Download and verify the release archive
//! 6. Extract it and swap it into place
//! 7. Configure the service (user, control script, autostart, config)
//! 8. Report the final installed version

use std::cmp::Ordering;
use std::path::PathBuf;

use tracing::{info, warn};

use super::plan::{self, InstalledState, LifecycleAction, LifecycleOptions, PlannedAction};
use super::scaffold::{self, ServerCredentials};
use crate::archive;
use crate::config::HelperConfig;
use crate::download::{ArtifactFetcher, DownloadTask};
use crate::error::{HelperError, HelperResult};
use crate::platform::{
    HandlerContext, HandlerRegistry, PlatformHandler, PlatformProfile, ScriptSource,
    ServiceAction,
};
use crate::release::{compare_tags, ReleaseInfo, ReleaseSource};

/// Directory below the scratch directory that archives are unpacked into.
const EXTRACT_DIR: &str = "extracted";

/// Stage callback.
pub type StageCallback<'a> = Box<dyn Fn(LifecycleStage) + 'a>;

/// Stages of a run, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    /// Fetching release metadata.
    Resolving,
    /// Downloading and verifying the archive.
    Downloading,
    /// Unpacking the archive.
    Extracting,
    /// Swapping the new bundle into place.
    Installing,
    /// User, control script, autostart and config.
    Configuring,
    /// Stopping the service and deleting files.
    Removing,
    /// Run complete.
    Complete,
}

impl LifecycleStage {
    /// Get a human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolving => "Resolving release",
            Self::Downloading => "Downloading",
            Self::Extracting => "Extracting",
            Self::Installing => "Installing",
            Self::Configuring => "Configuring service",
            Self::Removing => "Removing",
            Self::Complete => "Complete",
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOutcome {
    /// Action that was executed.
    pub action: PlannedAction,
    /// Version installed before the run.
    pub previous_version: Option<String>,
    /// Version reported after the run.
    pub installed_version: Option<String>,
    /// Credentials written by a fresh install.
    pub credentials: Option<ServerCredentials>,
}

/// Select the handler for `profile` and make sure it runs privileged.
pub fn select_handler(
    registry: &HandlerRegistry,
    profile: &PlatformProfile,
    ctx: &HandlerContext,
) -> HelperResult<Box<dyn PlatformHandler>> {
    let handler = registry.create(profile.os_family, ctx)?;
    info!("Using the {} handler", handler.name());
    handler.gain_privileges()?;
    Ok(handler)
}

/// Lifecycle driver.
///
/// Every collaborator is borrowed; the caller owns the scratch directory the
/// fetcher writes into.
pub struct LifecycleDriver<'a> {
    handler: &'a dyn PlatformHandler,
    releases: &'a dyn ReleaseSource,
    fetcher: &'a dyn ArtifactFetcher,
    profile: &'a PlatformProfile,
    config: &'a HelperConfig,
    options: LifecycleOptions,
    on_stage: Option<StageCallback<'a>>,
}

impl<'a> LifecycleDriver<'a> {
    /// Create a new driver.
    ///
    /// # Arguments
    ///
    /// * `handler` - Platform handler, already privileged
    /// * `releases` - Release metadata source
    /// * `fetcher` - Downloader writing into the scratch directory
    /// * `profile` - Detected host platform
    /// * `config` - Runtime settings
    pub fn new(
        handler: &'a dyn PlatformHandler,
        releases: &'a dyn ReleaseSource,
        fetcher: &'a dyn ArtifactFetcher,
        profile: &'a PlatformProfile,
        config: &'a HelperConfig,
    ) -> Self {
        Self {
            handler,
            releases,
            fetcher,
            profile,
            config,
            options: LifecycleOptions::default(),
            on_stage: None,
        }
    }

    /// Set the `force` / `sure` flags.
    pub fn with_options(mut self, options: LifecycleOptions) -> Self {
        self.options = options;
        self
    }

    /// Report each stage to `callback`.
    pub fn with_stage_callback(mut self, callback: impl Fn(LifecycleStage) + 'a) -> Self {
        self.on_stage = Some(Box::new(callback));
        self
    }

    fn stage(&self, stage: LifecycleStage) {
        if let Some(callback) = &self.on_stage {
            callback(stage);
        }
    }

    /// Run `action` to completion.
    ///
    /// # Errors
    ///
    /// Precondition failures are returned before any change to the host.
    /// Any later failure aborts the run; there is no partial success.
    pub fn run(&self, action: LifecycleAction) -> HelperResult<LifecycleOutcome> {
        plan::check_confirmation(action, self.options)?;

        let state = InstalledState::new(self.handler.query_installed_version());
        plan::check_installed_state(action, &state, self.options)?;

        let release = if action.needs_release() {
            self.stage(LifecycleStage::Resolving);
            Some(self.releases.latest(self.profile)?)
        } else {
            None
        };

        self.log_banner(&state, release.as_ref());

        let latest = release.as_ref().map(|r| r.version.as_str());
        let planned = plan::plan(action, &state, latest, self.options)?;
        info!("Action: {}", planned);

        let credentials = self.execute(planned, release.as_ref())?;

        let installed_version = self.handler.query_installed_version();
        match &installed_version {
            Some(version) => info!("Installed version: {}", version),
            None => info!("v2ray is not installed"),
        }
        self.stage(LifecycleStage::Complete);

        Ok(LifecycleOutcome {
            action: planned,
            previous_version: state.installed_version,
            installed_version,
            credentials,
        })
    }

    fn log_banner(&self, state: &InstalledState, release: Option<&ReleaseInfo>) {
        if let Some(release) = release {
            info!(
                "Latest version: {} {}",
                release.version,
                release.pre_release_marker()
            );
        }
        info!(
            "Platform: {}-{} ({})",
            self.profile.os_family, self.profile.arch_token, self.profile.machine
        );
        info!(
            "Installed version: {}",
            state.installed_version.as_deref().unwrap_or("none")
        );

        if let (Some(installed), Some(release)) = (&state.installed_version, release) {
            if compare_tags(installed, &release.version) == Some(Ordering::Greater) {
                warn!(
                    "Installed version {} is newer than the latest release {}",
                    installed, release.version
                );
            }
        }
    }

    fn execute(
        &self,
        planned: PlannedAction,
        release: Option<&ReleaseInfo>,
    ) -> HelperResult<Option<ServerCredentials>> {
        if let Some(packager) = self.handler.package_manager() {
            info!("Delegating {} to the {} package manager", planned, self.handler.name());
            match planned {
                PlannedAction::Install => packager.install()?,
                PlannedAction::Upgrade => packager.upgrade()?,
                PlannedAction::Remove => packager.remove()?,
                PlannedAction::Purge => packager.purge()?,
            }
            return Ok(None);
        }

        match planned {
            PlannedAction::Install => self.install(self.require_release(release)?),
            PlannedAction::Upgrade => {
                self.upgrade(self.require_release(release)?)?;
                Ok(None)
            }
            PlannedAction::Remove => {
                self.remove()?;
                Ok(None)
            }
            PlannedAction::Purge => {
                self.purge()?;
                Ok(None)
            }
        }
    }

    fn require_release<'r>(&self, release: Option<&'r ReleaseInfo>) -> HelperResult<&'r ReleaseInfo> {
        release.ok_or_else(|| HelperError::ResolveFailure {
            url: self.config.api_url.clone(),
            reason: "no release was resolved".to_string(),
        })
    }

    /// Download, verify, extract and place the release bundle.
    fn stage_bundle(&self, release: &ReleaseInfo) -> HelperResult<()> {
        let asset = release.require_asset()?;
        let scratch = self.fetcher.scratch_dir();

        self.stage(LifecycleStage::Downloading);
        let expected = self
            .config
            .checksum_policy
            .apply(self.releases.expected_digest(release))?;
        let url = self.releases.asset_url(release)?;
        let task = DownloadTask::new(url, scratch.join(asset)).with_expected(expected);
        let archive_path = self.fetcher.fetch_task(&task)?;

        self.stage(LifecycleStage::Extracting);
        let extracted: PathBuf = archive::extract_all(&archive_path, &scratch.join(EXTRACT_DIR))?;

        self.stage(LifecycleStage::Installing);
        self.handler.place_file(&extracted)?;
        info!("Placed v2ray {} in {}", release.version, self.handler.target_path()?.display());
        Ok(())
    }

    fn install(&self, release: &ReleaseInfo) -> HelperResult<Option<ServerCredentials>> {
        self.stage_bundle(release)?;
        self.handler.link_executables()?;

        self.stage(LifecycleStage::Configuring);
        self.handler.create_service_user()?;

        let scripts = ScriptSource::new(self.fetcher, &self.config.scripts_url);
        self.handler.install_control_script(&scripts)?;
        self.handler.auto_start_set(true)?;

        let credentials = scaffold::scaffold_config(self.handler.config_dir()?, &scripts)?;

        self.handler.service_control(ServiceAction::Start)?;
        info!("Successfully installed v2ray {}", release.version);

        if let Some(credentials) = &credentials {
            scaffold::log_credentials(credentials);
        }
        Ok(credentials)
    }

    fn upgrade(&self, release: &ReleaseInfo) -> HelperResult<()> {
        self.stage_bundle(release)?;
        self.handler.service_control(ServiceAction::Restart)?;
        info!("Successfully upgraded to v2ray {}", release.version);
        Ok(())
    }

    fn remove(&self) -> HelperResult<()> {
        self.stage(LifecycleStage::Removing);
        info!("Uninstalling...");

        info!("Stop v2ray process");
        if let Err(e) = self.handler.service_control(ServiceAction::Stop) {
            warn!("Cannot stop v2ray, service definition may be missing: {}", e);
        }
        info!("Disable auto start");
        if let Err(e) = self.handler.auto_start_set(false) {
            warn!("Cannot disable auto start: {}", e);
        }

        info!("Deleting symbolic links");
        self.handler.unlink_executables()?;

        info!("Deleting v2ray directory");
        self.handler.remove_installation()
    }

    fn purge(&self) -> HelperResult<()> {
        self.remove()?;

        info!("Deleting configuration");
        self.handler.remove_config()?;

        info!("Deleting user and group");
        self.handler.delete_service_user()?;

        info!("Deleting control script");
        self.handler.remove_control_script()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(LifecycleStage::Downloading.name(), "Downloading");
        assert_eq!(LifecycleStage::Configuring.name(), "Configuring service");
    }

    #[test]
    fn test_select_handler_for_unsupported_family() {
        use crate::platform::OsFamily;

        let registry = HandlerRegistry::new();
        let profile = PlatformProfile::new(OsFamily::Linux, "x86_64").unwrap();
        let result = select_handler(&registry, &profile, &HandlerContext::system());
        assert!(matches!(result, Err(HelperError::UnsupportedPlatform(_))));
    }
}
