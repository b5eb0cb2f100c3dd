//! Host OS and architecture detection.

use std::fmt;

use tracing::debug;

use crate::command::CommandRunner;
use crate::error::{HelperError, HelperResult};

/// Operating system families known to the helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    Darwin,
    FreeBsd,
    OpenBsd,
    Windows,
}

impl OsFamily {
    /// All families, in registry order.
    pub const ALL: [OsFamily; 5] = [
        Self::Linux,
        Self::Darwin,
        Self::FreeBsd,
        Self::OpenBsd,
        Self::Windows,
    ];

    /// Lowercase name as used in release asset names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::FreeBsd => "freebsd",
            Self::OpenBsd => "openbsd",
            Self::Windows => "windows",
        }
    }

    /// Parse an OS name (`uname -s` or `std::env::consts::OS` style).
    pub fn from_name(name: &str) -> HelperResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::Darwin),
            "freebsd" => Ok(Self::FreeBsd),
            "openbsd" => Ok(Self::OpenBsd),
            "windows" => Ok(Self::Windows),
            other => Err(HelperError::UnsupportedPlatform(format!(
                "operating system '{}'",
                other
            ))),
        }
    }

    /// Family of the running host.
    pub fn current() -> HelperResult<Self> {
        Self::from_name(std::env::consts::OS)
    }

    /// Whether release assets are searched for this family.
    ///
    /// Darwin installs through Homebrew instead.
    pub fn uses_release_assets(&self) -> bool {
        !matches!(self, Self::Darwin)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical architecture tokens and the machine identifiers they cover.
const ARCH_TABLE: &[(&str, &[&str])] = &[
    ("32", &["i386", "i686"]),
    ("64", &["x86_64", "amd64"]),
    ("arm", &["armv7l", "armv7", "armv7hf", "armv7hl"]),
    ("arm64", &["aarch64", "arm64"]),
];

/// Map a raw machine identifier onto its canonical token.
///
/// Matching ignores case. Unknown identifiers fail closed.
pub fn resolve_arch_token(machine: &str) -> HelperResult<&'static str> {
    let machine = machine.trim().to_ascii_lowercase();
    ARCH_TABLE
        .iter()
        .find(|(_, aliases)| aliases.contains(&machine.as_str()))
        .map(|(token, _)| *token)
        .ok_or_else(|| HelperError::UnsupportedPlatform(format!("architecture '{}'", machine)))
}

/// Machine identifiers accepted by [`resolve_arch_token`].
pub fn known_machines() -> impl Iterator<Item = (&'static str, &'static str)> {
    ARCH_TABLE
        .iter()
        .flat_map(|(token, aliases)| aliases.iter().map(move |m| (*m, *token)))
}

/// Facts about the host, derived once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub os_family: OsFamily,
    pub arch_token: String,
    /// Raw machine identifier the token was derived from.
    pub machine: String,
}

impl PlatformProfile {
    /// Build a profile from an OS family and a raw machine identifier.
    pub fn new(os_family: OsFamily, machine: &str) -> HelperResult<Self> {
        let arch_token = resolve_arch_token(machine)?;
        Ok(Self {
            os_family,
            arch_token: arch_token.to_string(),
            machine: machine.trim().to_string(),
        })
    }

    /// Inspect the running host.
    ///
    /// The machine identifier comes from `uname -m`, falling back to the
    /// compile-time architecture where `uname` is unavailable.
    pub fn detect(runner: &dyn CommandRunner) -> HelperResult<Self> {
        let os_family = OsFamily::current()?;

        let machine = match runner.run("uname -m") {
            Ok(output) if !output.trim().is_empty() => output.trim().to_string(),
            _ => fallback_machine().to_string(),
        };
        debug!(os = %os_family, machine = %machine, "detected platform");

        Self::new(os_family, &machine)
    }

    /// Suffix the release asset for this host must carry.
    pub fn asset_pattern(&self) -> String {
        format!("{}-{}.zip", self.os_family, self.arch_token)
    }
}

fn fallback_machine() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i386",
        "arm" => "armv7",
        other => other,
    }
}
