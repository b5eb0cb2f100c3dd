//! Single-file downloader with staged promotion.
//!
//! A transfer is written to `<dest>.partial` and renamed to `<dest>` only
//! after the stream completed and, when an expected digest is known, the
//! file verified. The destination is therefore either absent, the previous
//! file, or the complete new file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::checksum::{ChecksumVerifier, ExpectedDigest};
use super::http::Transport;
use super::progress::{ProgressReporter, DEFAULT_INTERVAL};
use crate::error::{HelperError, HelperResult};

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Suffix of the in-flight file.
const PARTIAL_SUFFIX: &str = "partial";

/// One transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Remote resource.
    pub url: String,
    /// Final path of the artifact.
    pub destination: PathBuf,
    /// Integrity facts to check before promotion.
    pub expected: Option<ExpectedDigest>,
}

impl DownloadTask {
    /// Create a task without integrity expectations.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            expected: None,
        }
    }

    /// Verify the artifact against `expected` before promoting it.
    pub fn with_expected(mut self, expected: Option<ExpectedDigest>) -> Self {
        self.expected = expected;
        self
    }

    /// Path of the in-flight file, `<destination>.partial`.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(PARTIAL_SUFFIX);
        self.destination.with_file_name(name)
    }
}

/// Fetches remote artifacts into the scratch directory.
pub trait ArtifactFetcher {
    /// Fetch `url` to `<scratch>/<dest_name>` without verification.
    fn fetch(&self, url: &str, dest_name: &str) -> HelperResult<PathBuf>;

    /// Run a fully specified transfer.
    fn fetch_task(&self, task: &DownloadTask) -> HelperResult<PathBuf>;

    /// Directory that `fetch` writes into.
    fn scratch_dir(&self) -> &Path;
}

/// Progress line settings.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSettings {
    /// Minimum time between rendered lines.
    pub interval: Duration,
    /// Terminal columns to pad to, 0 when unknown.
    pub terminal_width: usize,
    /// Whether to render at all.
    pub enabled: bool,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            terminal_width: 0,
            enabled: true,
        }
    }
}

/// [`ArtifactFetcher`] streaming through a [`Transport`].
pub struct ArtifactDownloader {
    transport: Arc<dyn Transport>,
    scratch: PathBuf,
    progress: ProgressSettings,
}

impl ArtifactDownloader {
    /// Create a downloader writing into `scratch`.
    pub fn new(transport: Arc<dyn Transport>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            scratch: scratch.into(),
            progress: ProgressSettings::default(),
        }
    }

    /// Configure the progress line.
    pub fn with_progress(mut self, progress: ProgressSettings) -> Self {
        self.progress = progress;
        self
    }

    fn download(&self, task: &DownloadTask) -> HelperResult<PathBuf> {
        let partial = task.partial_path();

        // Left behind by an interrupted run.
        remove_stale(&partial)?;

        if let Some(parent) = partial.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HelperError::io("failed to create directory", parent, e))?;
        }

        let body = self.transport.open(&task.url)?;
        let file = File::create(&partial)
            .map_err(|e| HelperError::io("failed to create", &partial, e))?;

        let name = task
            .destination
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let written = if self.progress.enabled {
            let mut reporter = ProgressReporter::new(io::stdout(), name)
                .with_interval(self.progress.interval)
                .with_terminal_width(self.progress.terminal_width);
            let written = stream(&task.url, body.reader, file, &partial, |n| {
                reporter.update(n, body.content_length);
            })?;
            reporter.finish(written);
            written
        } else {
            stream(&task.url, body.reader, file, &partial, |_| {})?
        };

        if let Some(total) = body.content_length {
            if written < total {
                return Err(HelperError::DownloadFailure {
                    url: task.url.clone(),
                    reason: format!("connection closed after {} of {} bytes", written, total),
                });
            }
        }
        debug!(url = %task.url, bytes = written, "transfer complete");

        if let Some(expected) = &task.expected {
            if let Err(err) = ChecksumVerifier::verify_expected(&partial, expected) {
                fs::remove_file(&partial).ok();
                return Err(err);
            }
        }

        fs::rename(&partial, &task.destination)
            .map_err(|e| HelperError::io("failed to rename", &partial, e))?;
        info!("Downloaded {}", task.destination.display());

        Ok(task.destination.clone())
    }
}

impl ArtifactFetcher for ArtifactDownloader {
    fn fetch(&self, url: &str, dest_name: &str) -> HelperResult<PathBuf> {
        self.download(&DownloadTask::new(url, self.scratch.join(dest_name)))
    }

    fn fetch_task(&self, task: &DownloadTask) -> HelperResult<PathBuf> {
        self.download(task)
    }

    fn scratch_dir(&self) -> &Path {
        &self.scratch
    }
}

fn remove_stale(partial: &Path) -> HelperResult<()> {
    match fs::remove_file(partial) {
        Ok(()) => {
            debug!(path = %partial.display(), "removed stale partial download");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HelperError::io("failed to remove", partial, e)),
    }
}

/// Stream `reader` into `file`, reporting the running byte count.
fn stream(
    url: &str,
    mut reader: Box<dyn Read + Send>,
    file: File,
    path: &Path,
    mut on_chunk: impl FnMut(u64),
) -> HelperResult<u64> {
    let mut writer = BufWriter::new(file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut downloaded = 0u64;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| HelperError::DownloadFailure {
                url: url.to_string(),
                reason: format!("Read error: {}", e),
            })?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| HelperError::io("failed to write", path, e))?;

        downloaded += bytes_read as u64;
        on_chunk(downloaded);
    }

    writer
        .flush()
        .map_err(|e| HelperError::io("failed to write", path, e))?;

    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::checksum::DigestAlgorithm;
    use crate::download::http::RemoteBody;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    /// Reader that fails after yielding `good` bytes.
    struct FailingReader {
        good: Vec<u8>,
        pos: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos < self.good.len() {
                let n = buf.len().min(self.good.len() - self.pos);
                buf[..n].copy_from_slice(&self.good[self.pos..self.pos + n]);
                self.pos += n;
                Ok(n)
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
    }

    enum Body {
        Ok(Vec<u8>),
        FailAfter(Vec<u8>),
        Short(Vec<u8>, u64),
    }

    struct FakeTransport {
        body: Mutex<Option<Body>>,
    }

    impl FakeTransport {
        fn new(body: Body) -> Arc<Self> {
            Arc::new(Self {
                body: Mutex::new(Some(body)),
            })
        }
    }

    impl Transport for FakeTransport {
        fn fetch_text(&self, _url: &str) -> HelperResult<String> {
            unreachable!()
        }

        fn open(&self, _url: &str) -> HelperResult<RemoteBody> {
            match self.body.lock().unwrap().take() {
                Some(Body::Ok(data)) => Ok(RemoteBody {
                    content_length: Some(data.len() as u64),
                    reader: Box::new(Cursor::new(data)),
                }),
                Some(Body::FailAfter(data)) => Ok(RemoteBody {
                    content_length: Some(data.len() as u64 * 2),
                    reader: Box::new(FailingReader { good: data, pos: 0 }),
                }),
                Some(Body::Short(data, announced)) => Ok(RemoteBody {
                    content_length: Some(announced),
                    reader: Box::new(Cursor::new(data)),
                }),
                None => Err(HelperError::DownloadFailure {
                    url: "fake".to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    fn downloader(transport: Arc<dyn Transport>, scratch: &Path) -> ArtifactDownloader {
        ArtifactDownloader::new(transport, scratch).with_progress(ProgressSettings {
            enabled: false,
            ..ProgressSettings::default()
        })
    }

    #[test]
    fn test_partial_path() {
        let task = DownloadTask::new("u", "/tmp/v2helper/v2ray-linux-64.zip");
        assert_eq!(
            task.partial_path(),
            PathBuf::from("/tmp/v2helper/v2ray-linux-64.zip.partial")
        );
    }

    #[test]
    fn test_fetch_promotes_on_success() {
        let temp = TempDir::new().unwrap();
        let fetcher = downloader(FakeTransport::new(Body::Ok(b"hello world".to_vec())), temp.path());

        let path = fetcher.fetch("https://example.com/a.zip", "a.zip").unwrap();

        assert_eq!(path, temp.path().join("a.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert!(!temp.path().join("a.zip.partial").exists());
    }

    #[test]
    fn test_stale_partial_is_replaced() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.zip.partial"), b"garbage from last run").unwrap();

        let fetcher = downloader(FakeTransport::new(Body::Ok(b"fresh".to_vec())), temp.path());
        let path = fetcher.fetch("https://example.com/a.zip", "a.zip").unwrap();

        assert_eq!(fs::read(path).unwrap(), b"fresh");
    }

    #[test]
    fn test_transport_error_keeps_partial_and_destination() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.zip");
        fs::write(&dest, b"previous artifact").unwrap();

        let fetcher = downloader(
            FakeTransport::new(Body::FailAfter(vec![1u8; 100_000])),
            temp.path(),
        );
        let result = fetcher.fetch("https://example.com/a.zip", "a.zip");

        assert!(matches!(result, Err(HelperError::DownloadFailure { .. })));
        assert_eq!(fs::read(&dest).unwrap(), b"previous artifact");
        assert!(temp.path().join("a.zip.partial").exists());
    }

    #[test]
    fn test_short_body_is_failure() {
        let temp = TempDir::new().unwrap();
        let fetcher = downloader(
            FakeTransport::new(Body::Short(vec![0u8; 10], 20)),
            temp.path(),
        );

        let result = fetcher.fetch("https://example.com/a.zip", "a.zip");
        assert!(matches!(result, Err(HelperError::DownloadFailure { .. })));
        assert!(!temp.path().join("a.zip").exists());
    }

    #[test]
    fn test_verified_task() {
        let temp = TempDir::new().unwrap();
        let fetcher = downloader(FakeTransport::new(Body::Ok(b"hello world".to_vec())), temp.path());

        let task = DownloadTask::new("https://example.com/a.zip", temp.path().join("a.zip"))
            .with_expected(Some(
                ExpectedDigest::new(DigestAlgorithm::Sha1, HELLO_SHA1).with_size(11),
            ));
        let path = fetcher.fetch_task(&task).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_mismatch_discards_artifact() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.zip");
        fs::write(&dest, b"previous artifact").unwrap();

        let fetcher = downloader(FakeTransport::new(Body::Ok(b"tampered".to_vec())), temp.path());
        let task = DownloadTask::new("https://example.com/a.zip", &dest)
            .with_expected(Some(ExpectedDigest::new(DigestAlgorithm::Sha1, HELLO_SHA1)));

        let result = fetcher.fetch_task(&task);

        assert!(matches!(result, Err(HelperError::IntegrityMismatch { .. })));
        assert_eq!(fs::read(&dest).unwrap(), b"previous artifact");
        assert!(!temp.path().join("a.zip.partial").exists());
    }

    #[test]
    fn test_open_failure_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let transport = FakeTransport::new(Body::Ok(Vec::new()));
        transport.body.lock().unwrap().take();

        let fetcher = downloader(transport, temp.path());
        let result = fetcher.fetch("https://example.com/a.zip", "a.zip");

        assert!(matches!(result, Err(HelperError::DownloadFailure { .. })));
        assert!(!temp.path().join("a.zip").exists());
    }

    #[test]
    fn test_fetch_over_http() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v4.23.0/v2ray-linux-64.zip")
            .with_status(200)
            .with_body("hello world")
            .create();

        let temp = TempDir::new().unwrap();
        let transport = Arc::new(crate::download::HttpTransport::new().unwrap());
        let fetcher = downloader(transport, temp.path());

        let task = DownloadTask::new(
            format!("{}/v4.23.0/v2ray-linux-64.zip", server.url()),
            temp.path().join("v2ray-linux-64.zip"),
        )
        .with_expected(Some(ExpectedDigest::new(
            DigestAlgorithm::Sha1,
            HELLO_SHA1.to_uppercase(),
        )));

        let path = fetcher.fetch_task(&task).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"hello world");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn failed_transfer_never_truncates_destination(
                previous in proptest::collection::vec(any::<u8>(), 0..512),
                sent in proptest::collection::vec(any::<u8>(), 0..200_000),
            ) {
                let temp = TempDir::new().unwrap();
                let dest = temp.path().join("a.zip");
                fs::write(&dest, &previous).unwrap();

                let fetcher = downloader(FakeTransport::new(Body::FailAfter(sent)), temp.path());
                let result = fetcher.fetch("https://example.com/a.zip", "a.zip");

                prop_assert!(result.is_err());
                prop_assert_eq!(fs::read(&dest).unwrap(), previous);
            }
        }
    }
}
