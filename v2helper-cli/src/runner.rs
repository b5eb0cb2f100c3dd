//! Wires the library together for one invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use v2helper::config::{self, HelperConfig};
use v2helper::download::{
    ArtifactDownloader, ChecksumPolicy, HttpTransport, ProgressSettings, Transport,
};
use v2helper::lifecycle::{
    check_confirmation, select_handler, LifecycleAction, LifecycleDriver, LifecycleOptions,
    LifecycleOutcome,
};
use v2helper::platform::{HandlerContext, HandlerRegistry, PlatformProfile};
use v2helper::release::ReleaseResolver;
use v2helper::scratch::{self, ScratchDir};

use crate::error::CliError;

/// Exit status after an interrupt (128 + SIGINT).
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// Settings for one run.
pub struct CliRunner {
    config: HelperConfig,
    config_path: PathBuf,
    options: LifecycleOptions,
}

impl CliRunner {
    /// Load the config file, `--config` taking precedence over the default.
    pub fn new(
        config_path: Option<PathBuf>,
        strict_checksum: bool,
        options: LifecycleOptions,
    ) -> Result<Self, CliError> {
        let config_path = config_path.unwrap_or_else(config::config_file_path);
        let mut config = HelperConfig::load(&config_path)?;
        if strict_checksum {
            config = config.with_checksum_policy(ChecksumPolicy::Require);
        }

        Ok(Self {
            config,
            config_path,
            options,
        })
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    pub fn log_startup(&self, action: LifecycleAction) {
        info!("v2helper {} ({})", v2helper::VERSION, action);
        debug!(config = %self.config_path.display(), "configuration loaded");
        debug!(
            policy = ?self.config().checksum_policy,
            timeout = ?self.config().timeout,
            "runtime settings"
        );
    }

    /// Run `action` end to end.
    pub fn run(&self, action: LifecycleAction) -> Result<LifecycleOutcome, CliError> {
        // nothing else may happen before an unconfirmed purge is refused
        check_confirmation(action, self.options)?;

        let ctx = HandlerContext::system();
        let profile = PlatformProfile::detect(ctx.runner.as_ref())?;
        let registry = HandlerRegistry::with_defaults();
        let handler = select_handler(&registry, &profile, &ctx)?;

        let scratch = ScratchDir::acquire(scratch::default_path())?;
        install_interrupt_handler(scratch.path())?;

        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::with_timeout(self.config.timeout)?);
        let fetcher = ArtifactDownloader::new(transport.clone(), scratch.path()).with_progress(
            ProgressSettings {
                interval: self.config.progress_interval,
                terminal_width: terminal_width(),
                enabled: true,
            },
        );
        let releases = ReleaseResolver::new(transport, self.config.clone());

        let outcome = LifecycleDriver::new(
            handler.as_ref(),
            &releases,
            &fetcher,
            &profile,
            &self.config,
        )
        .with_options(self.options)
        .run(action)?;

        Ok(outcome)
    }
}

/// Wipe the scratch directory and exit on Ctrl+C.
fn install_interrupt_handler(scratch: &Path) -> Result<(), CliError> {
    let scratch = scratch.to_path_buf();
    ctrlc::set_handler(move || {
        eprintln!();
        warn!("Interrupted, cleaning up...");
        if let Err(e) = scratch::wipe(&scratch) {
            warn!("Failed to remove {}: {}", scratch.display(), e);
        }
        std::process::exit(INTERRUPT_EXIT_CODE);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// Columns of the attached terminal, 0 when stdout is not a terminal.
fn terminal_width() -> usize {
    console::Term::stdout()
        .size_checked()
        .map(|(_, cols)| cols as usize)
        .unwrap_or(0)
}
