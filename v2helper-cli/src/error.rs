//! CLI error types.

use thiserror::Error;
use v2helper::HelperError;

/// Errors surfaced by the command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Helper(#[from] HelperError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
