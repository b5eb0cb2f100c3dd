//! v2helper - install, upgrade and remove the v2ray proxy
//!
//! This library detects the host platform, resolves the latest upstream
//! release, downloads and verifies the matching archive and drives the
//! install / upgrade / remove / purge lifecycle through a platform handler
//! selected at runtime.
//!
//! # Architecture
//!
//! ```text
//! LifecycleDriver
//!         │
//!         ├── ReleaseSource (trait)      ── ReleaseResolver + DigestManifest
//!         │
//!         ├── ArtifactFetcher (trait)    ── ArtifactDownloader
//!         │                                   ├── ProgressReporter
//!         │                                   └── ChecksumVerifier
//!         │
//!         └── HandlerRegistry ──> PlatformHandler (trait)
//!                                   ├── LinuxHandler
//!                                   ├── DarwinHandler
//!                                   ├── FreeBsdHandler
//!                                   ├── OpenBsdHandler
//!                                   └── WindowsHandler
//! ```

pub mod archive;
pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod lifecycle;
pub mod platform;
pub mod release;
pub mod scratch;

pub use error::{HelperError, HelperResult, Precondition};

/// Version of the library, shown in the run banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
