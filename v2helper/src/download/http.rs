//! HTTP transport for release metadata and artifacts.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::{HelperError, HelperResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// An open response body.
pub struct RemoteBody {
    /// Size announced by the server, if any.
    pub content_length: Option<u64>,
    /// Streaming reader over the body.
    pub reader: Box<dyn Read + Send>,
}

/// Fetches remote resources.
///
/// Errors are reported as [`HelperError::DownloadFailure`]; callers
/// re-classify them where a different kind applies.
pub trait Transport: Send + Sync {
    /// Fetch a small text resource in full.
    fn fetch_text(&self, url: &str) -> HelperResult<String>;

    /// Open a resource for streaming.
    fn open(&self, url: &str) -> HelperResult<RemoteBody>;
}

/// Blocking reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> HelperResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> HelperResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("v2helper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HelperError::DownloadFailure {
                url: String::new(),
                reason: format!("cannot create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    fn get(&self, url: &str) -> HelperResult<reqwest::blocking::Response> {
        debug!(url, "GET");

        let response = self.client.get(url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            };
            HelperError::DownloadFailure {
                url: url.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HelperError::DownloadFailure {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn fetch_text(&self, url: &str) -> HelperResult<String> {
        self.get(url)?
            .text()
            .map_err(|e| HelperError::DownloadFailure {
                url: url.to_string(),
                reason: format!("Read error: {}", e),
            })
    }

    fn open(&self, url: &str) -> HelperResult<RemoteBody> {
        let response = self.get(url)?;
        Ok(RemoteBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_default_timeout() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_transport_with_timeout() {
        let transport = HttpTransport::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(transport.timeout.as_secs(), 60);
    }

    #[test]
    fn test_fetch_text() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/metadata.txt")
            .with_status(200)
            .with_body("File: v2ray-linux-64.zip\n")
            .create();

        let transport = HttpTransport::new().unwrap();
        let body = transport
            .fetch_text(&format!("{}/metadata.txt", server.url()))
            .unwrap();

        assert_eq!(body, "File: v2ray-linux-64.zip\n");
        mock.assert();
    }

    #[test]
    fn test_error_status_is_download_failure() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/missing").with_status(404).create();

        let transport = HttpTransport::new().unwrap();
        let result = transport.fetch_text(&format!("{}/missing", server.url()));

        match result {
            Err(HelperError::DownloadFailure { url, reason }) => {
                assert!(url.ends_with("/missing"));
                assert!(reason.contains("404"));
            }
            other => panic!("Expected DownloadFailure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_reports_content_length() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v2ray.zip")
            .with_status(200)
            .with_body(vec![7u8; 1000])
            .create();

        let transport = HttpTransport::new().unwrap();
        let mut body = transport
            .open(&format!("{}/v2ray.zip", server.url()))
            .unwrap();

        assert_eq!(body.content_length, Some(1000));
        let mut data = Vec::new();
        body.reader.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 1000);
    }
}
