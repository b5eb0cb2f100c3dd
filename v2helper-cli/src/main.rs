//! v2helper CLI - install, upgrade and remove v2ray
//!
//! Exit status is 0 on success, 1 on any error and 130 after Ctrl+C.

mod error;
mod logging;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing::error;
use v2helper::lifecycle::{LifecycleAction, LifecycleOptions};

use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Parser, Debug)]
#[command(name = "v2helper")]
#[command(version, about = "Install, upgrade and remove the v2ray proxy", long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .args(["auto", "install", "upgrade", "remove", "purge"])
        .multiple(false)
))]
struct Cli {
    /// Install when absent, upgrade otherwise (default)
    #[arg(short = 'A', long)]
    auto: bool,

    /// Install v2ray
    #[arg(short = 'I', long)]
    install: bool,

    /// Upgrade an installed v2ray to the latest release
    #[arg(short = 'U', long)]
    upgrade: bool,

    /// Remove v2ray, keeping configuration and the service user
    #[arg(short = 'R', long)]
    remove: bool,

    /// Remove v2ray together with its configuration and service user
    #[arg(short = 'P', long)]
    purge: bool,

    /// Skip the installed / already-latest checks
    #[arg(long)]
    force: bool,

    /// Confirm --purge
    #[arg(long)]
    sure: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Config file (default: <config dir>/v2helper/config.ini)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Abort when the digest manifest is unavailable
    #[arg(long)]
    strict_checksum: bool,
}

impl Cli {
    fn action(&self) -> LifecycleAction {
        if self.install {
            LifecycleAction::Install
        } else if self.upgrade {
            LifecycleAction::Upgrade
        } else if self.remove {
            LifecycleAction::Remove
        } else if self.purge {
            LifecycleAction::Purge
        } else {
            LifecycleAction::Auto
        }
    }

    fn options(&self) -> LifecycleOptions {
        LifecycleOptions {
            force: self.force,
            sure: self.sure,
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let action = cli.action();
    let options = cli.options();
    let runner = CliRunner::new(cli.config, cli.strict_checksum, options)?;
    runner.log_startup(action);
    runner.run(action)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
