//! Opaque shell command execution.
//!
//! Service managers, account tools and package managers are all driven
//! through [`CommandRunner`]: run a command line, capture stdout, fail on a
//! non-zero exit.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{HelperError, HelperResult};

/// Runs shell command lines.
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the shell and return its stdout.
    ///
    /// A non-zero exit status is reported as [`HelperError::CommandFailed`].
    fn run(&self, command: &str) -> HelperResult<String>;

    /// Whether `program` can be found on `PATH`.
    fn exists(&self, program: &str) -> bool;
}

/// [`CommandRunner`] backed by `/bin/sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ShellRunner {
    /// Create a new shell runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> HelperResult<String> {
        debug!(command, "running command");

        let output = Command::new("/bin/sh")
            .args(["-c", command])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HelperError::CommandFailed {
                command: command.to_string(),
                status: "not started".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(HelperError::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let output = ShellRunner::new().run("echo hello").unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[test]
    fn test_run_nonzero_exit_is_error() {
        let result = ShellRunner::new().run("exit 3");
        match result {
            Err(HelperError::CommandFailed { command, .. }) => assert_eq!(command, "exit 3"),
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_exists() {
        let runner = ShellRunner::new();
        assert!(runner.exists("sh"));
        assert!(!runner.exists("definitely-not-a-real-program-v2helper"));
    }
}
