//! Static dispatch table from OS family to handler.
//!
//! Entries are evaluated in registration order and the first whose target
//! set contains the detected family wins. No match is `UnsupportedPlatform`.

use std::sync::Arc;

use tracing::debug;

use super::accounts::{AccountDatabase, SystemAccounts};
use super::darwin::DarwinHandler;
use super::freebsd::FreeBsdHandler;
use super::handler::PlatformHandler;
use super::linux::LinuxHandler;
use super::openbsd::OpenBsdHandler;
use super::privilege::{PrivilegeGate, SystemPrivilegeGate};
use super::profile::OsFamily;
use super::windows::WindowsHandler;
use crate::command::{CommandRunner, ShellRunner};
use crate::error::{HelperError, HelperResult};

/// Host services a handler is built from.
#[derive(Clone)]
pub struct HandlerContext {
    pub runner: Arc<dyn CommandRunner>,
    pub privilege: Arc<dyn PrivilegeGate>,
    pub accounts: Arc<dyn AccountDatabase>,
}

impl HandlerContext {
    /// Context backed by the real host.
    pub fn system() -> Self {
        Self {
            runner: Arc::new(ShellRunner::new()),
            privilege: Arc::new(SystemPrivilegeGate),
            accounts: Arc::new(SystemAccounts),
        }
    }
}

/// Builds a handler from a context.
pub type HandlerConstructor =
    Box<dyn Fn(&HandlerContext) -> HelperResult<Box<dyn PlatformHandler>> + Send + Sync>;

/// One row of the dispatch table.
pub struct HandlerEntry {
    pub name: &'static str,
    pub targets: &'static [OsFamily],
    construct: HandlerConstructor,
}

impl HandlerEntry {
    pub fn matches(&self, family: OsFamily) -> bool {
        self.targets.contains(&family)
    }

    pub fn construct(&self, ctx: &HandlerContext) -> HelperResult<Box<dyn PlatformHandler>> {
        (self.construct)(ctx)
    }
}

/// Ordered dispatch table.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<HandlerEntry>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in variants.
    pub fn with_defaults() -> Self {
        Self::new()
            .register("linux", &[OsFamily::Linux], |ctx| {
                Ok(Box::new(LinuxHandler::new(ctx)))
            })
            .register("darwin", &[OsFamily::Darwin], |ctx| {
                Ok(Box::new(DarwinHandler::new(ctx)?))
            })
            .register("freebsd", &[OsFamily::FreeBsd], |ctx| {
                Ok(Box::new(FreeBsdHandler::new(ctx)))
            })
            .register("openbsd", &[OsFamily::OpenBsd], |ctx| {
                Ok(Box::new(OpenBsdHandler::new(ctx)))
            })
            .register("windows", &[OsFamily::Windows], |_| {
                Ok(Box::new(WindowsHandler))
            })
    }

    /// Append an entry.
    pub fn register<F>(mut self, name: &'static str, targets: &'static [OsFamily], construct: F) -> Self
    where
        F: Fn(&HandlerContext) -> HelperResult<Box<dyn PlatformHandler>> + Send + Sync + 'static,
    {
        self.entries.push(HandlerEntry {
            name,
            targets,
            construct: Box::new(construct),
        });
        self
    }

    /// First entry targeting `family`.
    pub fn select(&self, family: OsFamily) -> HelperResult<&HandlerEntry> {
        for entry in &self.entries {
            debug!(handler = entry.name, targets = ?entry.targets, "checking handler");
            if entry.matches(family) {
                debug!(handler = entry.name, "handler selected");
                return Ok(entry);
            }
        }
        Err(HelperError::UnsupportedPlatform(format!(
            "no handler for {}",
            family
        )))
    }

    /// Select and construct the handler for `family`.
    pub fn create(
        &self,
        family: OsFamily,
        ctx: &HandlerContext,
    ) -> HelperResult<Box<dyn PlatformHandler>> {
        self.select(family)?.construct(ctx)
    }

    /// Registered handler names, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }
}
