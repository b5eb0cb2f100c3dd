//! Root privilege acquisition.
//!
//! [`ensure_privileged`] either returns with the process privileged or fails
//! with [`HelperError::PrivilegeFailure`]. Escalation replaces the running
//! process with `sudo` (preferred) or `su -c`, so on success it never
//! returns.

use std::env;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{HelperError, HelperResult};

/// Escalation mechanism of the host.
pub trait PrivilegeGate: Send + Sync {
    /// Whether the process already runs as root.
    fn is_privileged(&self) -> bool;

    /// Hand control to a privileged copy of this process.
    fn escalate(&self) -> HelperResult<()>;
}

/// Return immediately when privileged, otherwise escalate.
pub fn ensure_privileged(gate: &dyn PrivilegeGate) -> HelperResult<()> {
    if gate.is_privileged() {
        debug!("already running as root");
        return Ok(());
    }
    gate.escalate()
}

/// [`PrivilegeGate`] re-executing through `sudo` or `su`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPrivilegeGate;

impl SystemPrivilegeGate {
    fn relaunch_command() -> HelperResult<(PathBuf, Vec<String>)> {
        let exe = env::current_exe()
            .map_err(|e| HelperError::PrivilegeFailure(format!("cannot locate executable: {}", e)))?;
        let args = env::args().skip(1).collect();
        Ok((exe, args))
    }
}

impl PrivilegeGate for SystemPrivilegeGate {
    fn is_privileged(&self) -> bool {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail.
            unsafe { libc::geteuid() == 0 }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    #[cfg(unix)]
    fn escalate(&self) -> HelperResult<()> {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let (exe, args) = Self::relaunch_command()?;
        info!("Re-launching with root privileges...");

        let err = if let Ok(sudo) = which::which("sudo") {
            debug!("found sudo, re-launching through it");
            Command::new(sudo).arg(&exe).args(&args).exec()
        } else if let Ok(su) = which::which("su") {
            debug!("found su, re-launching through it");
            let mut line = vec![shell_quote(&exe.to_string_lossy())];
            line.extend(args.iter().map(|a| shell_quote(a)));
            Command::new(su).arg("-c").arg(line.join(" ")).exec()
        } else {
            return Err(HelperError::PrivilegeFailure(
                "neither sudo nor su is available".to_string(),
            ));
        };

        // exec only returns on failure.
        Err(HelperError::PrivilegeFailure(format!(
            "failed to re-launch {}: {}",
            exe.display(),
            err
        )))
    }

    #[cfg(not(unix))]
    fn escalate(&self) -> HelperResult<()> {
        Err(HelperError::PrivilegeFailure(
            "privilege escalation requires a Unix-like host".to_string(),
        ))
    }
}

/// Quote `arg` for `sh -c`.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Gate {
        privileged: bool,
        escalated: AtomicBool,
    }

    impl PrivilegeGate for Gate {
        fn is_privileged(&self) -> bool {
            self.privileged
        }

        fn escalate(&self) -> HelperResult<()> {
            self.escalated.store(true, Ordering::SeqCst);
            Err(HelperError::PrivilegeFailure("no sudo".to_string()))
        }
    }

    #[test]
    fn test_privileged_does_not_escalate() {
        let gate = Gate {
            privileged: true,
            escalated: AtomicBool::new(false),
        };
        assert!(ensure_privileged(&gate).is_ok());
        assert!(!gate.escalated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unprivileged_escalates() {
        let gate = Gate {
            privileged: false,
            escalated: AtomicBool::new(false),
        };
        let result = ensure_privileged(&gate);
        assert!(matches!(result, Err(HelperError::PrivilegeFailure(_))));
        assert!(gate.escalated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("--install"), "--install");
        assert_eq!(shell_quote("/usr/local/bin/v2helper"), "/usr/local/bin/v2helper");
        assert_eq!(shell_quote("my config.ini"), "'my config.ini'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
