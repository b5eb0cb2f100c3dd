//! Digest manifest parsing.
//!
//! Releases publish a text manifest of blank-line separated blocks:
//!
//! ```text
//! File: v2ray-linux-64.zip
//! Size: 11263422
//! SHA1: 0d7c1cb5c9b6a0ae6a9c3b4b28b69a6c61e0f2f5
//! SHA256: 7e1f...
//!
//! File: v2ray-linux-arm.zip
//! ...
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::download::{DigestAlgorithm, ExpectedDigest};

/// Integrity facts listed for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file: String,
    pub size: Option<u64>,
    pub digests: BTreeMap<DigestAlgorithm, String>,
}

impl ManifestEntry {
    /// Expectation using the strongest digest listed, if any.
    pub fn expected(&self) -> Option<ExpectedDigest> {
        let (algorithm, hex) = self.digests.iter().next_back()?;
        let expected = ExpectedDigest::new(*algorithm, hex.clone());
        Some(match self.size {
            Some(size) => expected.with_size(size),
            None => expected,
        })
    }
}

/// Parsed digest manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestManifest {
    entries: Vec<ManifestEntry>,
}

impl DigestManifest {
    /// Parse manifest text. Lines that do not fit the format are ignored.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut current: Option<ManifestEntry> = None;

        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();

            match fields.as_slice() {
                [] => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                ["File:", name] => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    current = Some(ManifestEntry {
                        file: (*name).to_string(),
                        ..ManifestEntry::default()
                    });
                }
                [label, value] => {
                    let Some(entry) = current.as_mut() else {
                        continue;
                    };
                    if label.eq_ignore_ascii_case("Size:") {
                        match value.parse() {
                            Ok(size) => entry.size = Some(size),
                            Err(_) => debug!(file = %entry.file, value, "ignoring malformed size"),
                        }
                    } else if let Some(algorithm) = DigestAlgorithm::from_label(label) {
                        entry.digests.insert(algorithm, value.to_ascii_lowercase());
                    }
                }
                _ => {}
            }
        }

        if let Some(entry) = current {
            entries.push(entry);
        }

        Self { entries }
    }

    /// Entry for `file`, if listed.
    pub fn entry(&self, file: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.file == file)
    }

    /// Number of listed assets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no asset is listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
