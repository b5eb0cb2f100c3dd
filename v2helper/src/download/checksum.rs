//! Streaming checksum calculation for downloaded artifacts.
//!
//! Upstream manifests publish SHA-1 for every asset and SHA-256 for newer
//! releases; [`ChecksumVerifier`] handles both.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{HelperError, HelperResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithms understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Label used by the digest manifest (`SHA1:`, `SHA256:`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Parse a manifest label, ignoring case and a trailing colon.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim_end_matches(':').to_ascii_uppercase().as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" | "SHA2-256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected integrity facts for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    /// Algorithm of `hex`.
    pub algorithm: DigestAlgorithm,
    /// Hex-encoded digest, any case.
    pub hex: String,
    /// Byte size, when the manifest lists one.
    pub size: Option<u64>,
}

impl ExpectedDigest {
    /// Create an expectation without a size.
    pub fn new(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into(),
            size: None,
        }
    }

    /// Also require the artifact to be `size` bytes long.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// What to do when the expected digest cannot be obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Log a warning and install without verification.
    #[default]
    SkipOnUnavailable,
    /// Abort the run.
    Require,
}

impl ChecksumPolicy {
    /// Parse the `checksum_policy` config value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Some(Self::SkipOnUnavailable),
            "strict" | "require" => Some(Self::Require),
            _ => None,
        }
    }

    /// Apply the policy to the outcome of a manifest lookup.
    ///
    /// Only [`HelperError::DigestFetchFailure`] is recoverable; every other
    /// error is returned unchanged.
    pub fn apply(
        &self,
        lookup: HelperResult<ExpectedDigest>,
    ) -> HelperResult<Option<ExpectedDigest>> {
        match lookup {
            Ok(expected) => Ok(Some(expected)),
            Err(err @ HelperError::DigestFetchFailure { .. }) => match self {
                Self::SkipOnUnavailable => {
                    warn!("{}, validation is skipped", err);
                    Ok(None)
                }
                Self::Require => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}

/// Computes and compares file digests.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumVerifier {
    algorithm: DigestAlgorithm,
}

impl ChecksumVerifier {
    /// Create a verifier for `algorithm`.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Algorithm used by this verifier.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Calculate the digest of a file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file to checksum
    ///
    /// # Returns
    ///
    /// The lowercase hexadecimal digest of the file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn digest(&self, path: &Path) -> HelperResult<String> {
        match self.algorithm {
            DigestAlgorithm::Sha1 => hash_file::<Sha1>(path),
            DigestAlgorithm::Sha256 => hash_file::<Sha256>(path),
        }
    }

    /// Verify that a file matches an expected hex digest.
    ///
    /// Hex comparison ignores case.
    pub fn verify(&self, path: &Path, expected: &str) -> HelperResult<()> {
        let actual = self.digest(path)?;
        debug!(
            path = %path.display(),
            expected,
            actual = %actual,
            "comparing {}",
            self.algorithm
        );

        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(HelperError::IntegrityMismatch {
                filename: file_name(path),
                kind: self.algorithm.label(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify size and digest of a file against a manifest entry.
    pub fn verify_expected(path: &Path, expected: &ExpectedDigest) -> HelperResult<()> {
        if let Some(size) = expected.size {
            let actual = path
                .metadata()
                .map_err(|e| HelperError::io("failed to stat", path, e))?
                .len();
            if actual != size {
                return Err(HelperError::IntegrityMismatch {
                    filename: file_name(path),
                    kind: "Size",
                    expected: size.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        Self::new(expected.algorithm).verify(path, &expected.hex)?;
        info!("File {} has passed the validation", file_name(path));
        Ok(())
    }
}

fn hash_file<D: Digest>(path: &Path) -> HelperResult<String> {
    let mut file = File::open(path).map_err(|e| HelperError::io("failed to open", path, e))?;

    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| HelperError::io("failed to read", path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex(&hasher.finalize()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(data).unwrap();
        path
    }

    #[test]
    fn test_sha1_digest() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        let digest = ChecksumVerifier::new(DigestAlgorithm::Sha1)
            .digest(&path)
            .unwrap();
        assert_eq!(digest, HELLO_SHA1);
    }

    #[test]
    fn test_sha256_digest() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        let digest = ChecksumVerifier::new(DigestAlgorithm::Sha256)
            .digest(&path)
            .unwrap();
        assert_eq!(digest, HELLO_SHA256);
    }

    #[test]
    fn test_empty_file_sha1() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "empty.txt", b"");

        let digest = ChecksumVerifier::new(DigestAlgorithm::Sha1)
            .digest(&path)
            .unwrap();
        assert_eq!(digest, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_digest_nonexistent_file() {
        let result = ChecksumVerifier::new(DigestAlgorithm::Sha1)
            .digest(Path::new("/nonexistent/file.zip"));
        assert!(matches!(result, Err(HelperError::Io { .. })));
    }

    #[test]
    fn test_verify_ignores_case() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        let verifier = ChecksumVerifier::new(DigestAlgorithm::Sha1);
        assert!(verifier.verify(&path, &HELLO_SHA1.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        let result = ChecksumVerifier::new(DigestAlgorithm::Sha1).verify(&path, "wrong");
        match result {
            Err(HelperError::IntegrityMismatch { filename, kind, .. }) => {
                assert_eq!(filename, "test.txt");
                assert_eq!(kind, "SHA1");
            }
            other => panic!("Expected IntegrityMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_expected_checks_size_first() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        let expected = ExpectedDigest::new(DigestAlgorithm::Sha1, HELLO_SHA1).with_size(12);
        match ChecksumVerifier::verify_expected(&path, &expected) {
            Err(HelperError::IntegrityMismatch { kind, expected, actual, .. }) => {
                assert_eq!(kind, "Size");
                assert_eq!(expected, "12");
                assert_eq!(actual, "11");
            }
            other => panic!("Expected size mismatch, got {:?}", other),
        }

        let expected = ExpectedDigest::new(DigestAlgorithm::Sha1, HELLO_SHA1).with_size(11);
        assert!(ChecksumVerifier::verify_expected(&path, &expected).is_ok());
    }

    #[test]
    fn test_large_file_is_stable() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "large.bin", &vec![0xABu8; 200_000]);

        let verifier = ChecksumVerifier::new(DigestAlgorithm::Sha256);
        let first = verifier.digest(&path).unwrap();
        let second = verifier.digest(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_algorithm_labels() {
        assert_eq!(DigestAlgorithm::from_label("SHA1:"), Some(DigestAlgorithm::Sha1));
        assert_eq!(DigestAlgorithm::from_label("sha256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::from_label("Size:"), None);
        assert!(DigestAlgorithm::Sha256 > DigestAlgorithm::Sha1);
    }

    #[test]
    fn test_policy_skip_recovers_only_digest_fetch_failure() {
        let unavailable = || -> HelperResult<ExpectedDigest> {
            Err(HelperError::DigestFetchFailure {
                url: "https://example.com/metadata.txt".to_string(),
                reason: "connection refused".to_string(),
            })
        };

        let skipped = ChecksumPolicy::SkipOnUnavailable.apply(unavailable()).unwrap();
        assert!(skipped.is_none());

        let strict = ChecksumPolicy::Require.apply(unavailable());
        assert!(matches!(strict, Err(HelperError::DigestFetchFailure { .. })));

        let other = ChecksumPolicy::SkipOnUnavailable.apply(Err(HelperError::InvalidConfig(
            "bad".to_string(),
        )));
        assert!(matches!(other, Err(HelperError::InvalidConfig(_))));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(ChecksumPolicy::parse("skip"), Some(ChecksumPolicy::SkipOnUnavailable));
        assert_eq!(ChecksumPolicy::parse(" Strict "), Some(ChecksumPolicy::Require));
        assert_eq!(ChecksumPolicy::parse("maybe"), None);
        assert_eq!(ChecksumPolicy::default(), ChecksumPolicy::SkipOnUnavailable);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn flipping_any_bit_fails_verification(
                data in proptest::collection::vec(any::<u8>(), 1..4096),
                index in any::<prop::sample::Index>(),
                bit in 0u8..8,
            ) {
                let temp = TempDir::new().unwrap();
                let path = temp.path().join("artifact.bin");
                fs::write(&path, &data).unwrap();

                let verifier = ChecksumVerifier::new(DigestAlgorithm::Sha1);
                let expected = verifier.digest(&path).unwrap();
                prop_assert!(verifier.verify(&path, &expected).is_ok());

                let mut mutated = data.clone();
                let i = index.index(mutated.len());
                mutated[i] ^= 1 << bit;
                fs::write(&path, &mutated).unwrap();

                prop_assert!(verifier.verify(&path, &expected).is_err());
            }
        }
    }
}
