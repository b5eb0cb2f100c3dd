//! Service user and group management.

use std::path::Path;

use tracing::{debug, info};

use super::unix::remove_if_exists;
use crate::command::CommandRunner;
use crate::error::HelperResult;

/// Read access to the system account database.
pub trait AccountDatabase: Send + Sync {
    fn user_exists(&self, name: &str) -> bool;

    fn group_exists(&self, name: &str) -> bool;

    /// Uid of the user and gid of the group sharing `name`.
    fn ids(&self, name: &str) -> Option<(u32, u32)>;
}

/// [`AccountDatabase`] backed by `getpwnam(3)` / `getgrnam(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccounts;

#[cfg(unix)]
impl SystemAccounts {
    fn uid(name: &str) -> Option<u32> {
        let name = std::ffi::CString::new(name).ok()?;
        // SAFETY: `name` is NUL-terminated; the returned record is read
        // before any other passwd call can overwrite it.
        unsafe {
            let entry = libc::getpwnam(name.as_ptr());
            if entry.is_null() {
                None
            } else {
                Some((*entry).pw_uid)
            }
        }
    }

    fn gid(name: &str) -> Option<u32> {
        let name = std::ffi::CString::new(name).ok()?;
        // SAFETY: as for `uid`, with the group database.
        unsafe {
            let entry = libc::getgrnam(name.as_ptr());
            if entry.is_null() {
                None
            } else {
                Some((*entry).gr_gid)
            }
        }
    }
}

#[cfg(unix)]
impl AccountDatabase for SystemAccounts {
    fn user_exists(&self, name: &str) -> bool {
        Self::uid(name).is_some()
    }

    fn group_exists(&self, name: &str) -> bool {
        Self::gid(name).is_some()
    }

    fn ids(&self, name: &str) -> Option<(u32, u32)> {
        Some((Self::uid(name)?, Self::gid(name)?))
    }
}

#[cfg(not(unix))]
impl AccountDatabase for SystemAccounts {
    fn user_exists(&self, _name: &str) -> bool {
        false
    }

    fn group_exists(&self, _name: &str) -> bool {
        false
    }

    fn ids(&self, _name: &str) -> Option<(u32, u32)> {
        None
    }
}

/// Argument order of the platform's `useradd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseraddForm {
    /// `useradd <name> -md <home> ...` (shadow-utils, pw(8))
    NameFirst,
    /// `useradd -md <home> ... <name>` (OpenBSD)
    NameLast,
}

/// Command templates of one platform's account tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTool {
    prefix: &'static str,
    form: UseraddForm,
}

impl AccountTool {
    /// shadow-utils `useradd` / `groupadd`.
    pub const SHADOW: Self = Self {
        prefix: "",
        form: UseraddForm::NameFirst,
    };

    /// FreeBSD `pw useradd` / `pw groupadd`.
    pub const PW: Self = Self {
        prefix: "pw ",
        form: UseraddForm::NameFirst,
    };

    /// OpenBSD `useradd` with the name last.
    pub const OPENBSD: Self = Self {
        prefix: "",
        form: UseraddForm::NameLast,
    };

    pub fn add_group_command(&self, name: &str) -> String {
        format!("{}groupadd {}", self.prefix, name)
    }

    pub fn add_user_command(&self, name: &str, home: &Path) -> String {
        match self.form {
            UseraddForm::NameFirst => format!(
                "{}useradd {} -md {} -s /sbin/nologin -g {}",
                self.prefix,
                name,
                home.display(),
                name
            ),
            UseraddForm::NameLast => format!(
                "{}useradd -md {} -s /sbin/nologin -g {} {}",
                self.prefix,
                home.display(),
                name,
                name
            ),
        }
    }

    pub fn delete_user_command(&self, name: &str) -> String {
        format!("{}userdel {}", self.prefix, name)
    }

    pub fn delete_group_command(&self, name: &str) -> String {
        format!("{}groupdel {}", self.prefix, name)
    }
}

/// Create group and user `name` when missing.
///
/// A leftover home directory is removed before the user is created.
pub fn ensure_account(
    runner: &dyn CommandRunner,
    accounts: &dyn AccountDatabase,
    tool: AccountTool,
    name: &str,
    home: &Path,
) -> HelperResult<()> {
    if accounts.group_exists(name) {
        debug!(group = name, "group exists");
    } else {
        runner.run(&tool.add_group_command(name))?;
        info!("Created group {}", name);
    }

    if accounts.user_exists(name) {
        debug!(user = name, "user exists");
    } else {
        remove_if_exists(home)?;
        runner.run(&tool.add_user_command(name, home))?;
        info!("Created user {}", name);
    }
    Ok(())
}

/// Delete user and group `name` when present, along with the home directory.
pub fn delete_account(
    runner: &dyn CommandRunner,
    accounts: &dyn AccountDatabase,
    tool: AccountTool,
    name: &str,
    home: &Path,
) -> HelperResult<()> {
    if accounts.user_exists(name) {
        runner.run(&tool.delete_user_command(name))?;
        remove_if_exists(home)?;
        info!("Deleted user {}", name);
    }

    if accounts.group_exists(name) {
        runner.run(&tool.delete_group_command(name))?;
        info!("Deleted group {}", name);
    }
    Ok(())
}
