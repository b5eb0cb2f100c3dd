//! Error types for v2helper.
//!
//! Every fatal condition of a run maps to exactly one [`HelperError`]
//! variant. Only [`HelperError::DigestFetchFailure`] is ever recovered
//! locally (see [`ChecksumPolicy`](crate::download::ChecksumPolicy)).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for v2helper operations.
pub type HelperResult<T> = Result<T, HelperError>;

/// Lifecycle precondition that was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Install requested while a version is present and `--force` is unset.
    AlreadyInstalled,
    /// Upgrade or remove requested while nothing is installed.
    NotInstalled,
    /// Purge requested without `--sure`.
    ConfirmationRequired,
}

impl Precondition {
    /// Stable identifier of the precondition.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AlreadyInstalled => "AlreadyInstalled",
            Self::NotInstalled => "NotInstalled",
            Self::ConfirmationRequired => "ConfirmationRequired",
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled => {
                write!(f, "v2ray is already installed, use --force to reinstall")
            }
            Self::NotInstalled => write!(f, "v2ray is not installed"),
            Self::ConfirmationRequired => {
                write!(f, "purge deletes configuration and users, confirm with --sure")
            }
        }
    }
}

/// Errors that can occur while installing or managing v2ray.
#[derive(Debug, Error)]
pub enum HelperError {
    /// Host OS or architecture is outside the supported table.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Release metadata could not be fetched or understood.
    #[error("failed to resolve release from {url}: {reason}")]
    ResolveFailure { url: String, reason: String },

    /// Digest manifest could not be fetched or lacks the asset.
    #[error("unable to fetch digest manifest {url}: {reason}")]
    DigestFetchFailure { url: String, reason: String },

    /// Downloaded artifact does not match the manifest.
    #[error("integrity check failed for {filename}: expected {kind} {expected}, got {actual}")]
    IntegrityMismatch {
        filename: String,
        kind: &'static str,
        expected: String,
        actual: String,
    },

    /// Transport error while fetching a resource.
    #[error("failed to download {url}: {reason}")]
    DownloadFailure { url: String, reason: String },

    /// No way to obtain root privileges.
    #[error("cannot gain root privileges: {0}")]
    PrivilegeFailure(String),

    /// A lifecycle precondition was violated.
    #[error("{0}")]
    PreconditionViolation(Precondition),

    /// Auto mode found nothing to do.
    #[error("v2ray {version} is already the latest version, use --force to reinstall it")]
    AlreadyLatest { version: String },

    /// An external command exited unsuccessfully.
    #[error("command `{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Archive could not be unpacked.
    #[error("failed to extract {}: {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Configuration file holds an invalid value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HelperError {
    /// Build an [`HelperError::Io`] for `path`.
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error is the precondition `which`.
    pub fn is_precondition(&self, which: Precondition) -> bool {
        matches!(self, Self::PreconditionViolation(p) if *p == which)
    }
}
