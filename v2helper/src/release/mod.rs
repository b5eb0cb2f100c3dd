//! Upstream release metadata.
//!
//! - `resolver`: latest release, asset selection, manifest lookup
//! - `manifest`: digest manifest format
//! - `version`: tag normalisation and comparison

mod manifest;
mod resolver;
mod version;

pub use manifest::{DigestManifest, ManifestEntry};
pub use resolver::{ReleaseInfo, ReleaseResolver, ReleaseSource};
pub use version::{compare_tags, normalize_tag, parse_version_output};
