//! Host detection and per-OS handlers.
//!
//! - `profile`: OS family and architecture token of the host
//! - `handler`: the [`PlatformHandler`] capability set
//! - `registry`: first-match dispatch from OS family to handler
//! - `linux`, `darwin`, `freebsd`, `openbsd`, `windows`: the variants
//! - `unix`, `bsd`, `accounts`, `rc_conf`, `privilege`: shared free functions
//!
//! # Architecture
//!
//! ```text
//! PlatformProfile::detect ──> OsFamily ──> HandlerRegistry::create
//!                                                 │
//!                          HandlerContext ────────┤
//!                 (CommandRunner, PrivilegeGate,  │
//!                  AccountDatabase)               v
//!                                        Box<dyn PlatformHandler>
//! ```

mod accounts;
mod bsd;
mod darwin;
mod freebsd;
mod handler;
mod linux;
mod openbsd;
mod privilege;
mod profile;
mod rc_conf;
mod registry;
mod unix;
mod windows;

#[cfg(test)]
pub(crate) mod testing;

pub use accounts::{AccountDatabase, AccountTool, SystemAccounts};
pub use darwin::DarwinHandler;
pub use freebsd::FreeBsdHandler;
pub use handler::{
    unsupported, ExternalPackager, PlatformHandler, ScriptSource, ServiceAction, UnixLayout,
    EXECUTABLES, SERVICE_USER,
};
pub use linux::LinuxHandler;
pub use openbsd::OpenBsdHandler;
pub use privilege::{ensure_privileged, shell_quote, PrivilegeGate, SystemPrivilegeGate};
pub use profile::{known_machines, resolve_arch_token, OsFamily, PlatformProfile};
pub use registry::{HandlerConstructor, HandlerContext, HandlerEntry, HandlerRegistry};
pub use unix::{move_file, place_tree, remove_if_exists};
pub use windows::WindowsHandler;

/// Default layouts, per variant.
pub mod layouts {
    pub use super::freebsd::default_layout as freebsd;
    pub use super::linux::default_layout as linux;
    pub use super::openbsd::default_layout as openbsd;
}
