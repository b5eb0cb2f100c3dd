//! Artifact download, integrity checking and progress reporting.
//!
//! This module provides:
//! - A transport seam over blocking HTTP (`http`)
//! - Staged single-file downloads (`downloader`)
//! - SHA-1 / SHA-256 verification and the manifest policy (`checksum`)
//! - The rate-limited progress line (`progress`, `format`)
//!
//! # Architecture
//!
//! ```text
//! ArtifactDownloader ──> Transport (trait) ── HttpTransport
//!         │
//!         ├── ProgressReporter  (per-chunk callback, wall-clock rate limit)
//!         │
//!         └── ChecksumVerifier  (before <dest>.partial is renamed to <dest>)
//! ```

mod checksum;
mod downloader;
mod format;
mod http;
mod progress;

pub use checksum::{ChecksumPolicy, ChecksumVerifier, DigestAlgorithm, ExpectedDigest};
pub use downloader::{ArtifactDownloader, ArtifactFetcher, DownloadTask, ProgressSettings};
pub use format::{format_duration, format_size, format_speed};
pub use http::{HttpTransport, RemoteBody, Transport, DEFAULT_TIMEOUT_SECS};
pub use progress::{ProgressReporter, ProgressStats, DEFAULT_INTERVAL};
