//! Configuration file handling.
//!
//! Settings live in an optional INI file at `~/.config/v2helper/config.ini`:
//!
//! ```ini
//! [release]
//! api_url = https://api.github.com/repos/v2ray/v2ray-core/releases/latest
//! download_url = https://github.com/v2ray/v2ray-core/releases/download
//! manifest_name = metadata.txt
//!
//! [scripts]
//! base_url = https://raw.githubusercontent.com/waf7225/v2rayHelper/master
//!
//! [download]
//! timeout = 300
//! progress_interval_ms = 100
//!
//! [verify]
//! checksum_policy = skip
//! ```
//!
//! Install locations are fixed per platform and not configurable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use crate::download::{ChecksumPolicy, DEFAULT_INTERVAL, DEFAULT_TIMEOUT_SECS};
use crate::error::{HelperError, HelperResult};

/// Default latest-release endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com/repos/v2ray/v2ray-core/releases/latest";

/// Default base URL for release assets.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com/v2ray/v2ray-core/releases/download";

/// Default digest manifest file name.
pub const DEFAULT_MANIFEST_NAME: &str = "metadata.txt";

/// Default base URL for control scripts and the config template.
pub const DEFAULT_SCRIPTS_URL: &str = "https://raw.githubusercontent.com/waf7225/v2rayHelper/master";

/// Location of the config file, `<config_dir>/v2helper/config.ini`.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("v2helper")
        .join("config.ini")
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HelperConfig {
    /// Latest-release metadata endpoint.
    pub api_url: String,
    /// Base for `<base>/<tag>/<asset>` downloads.
    pub download_url: String,
    /// Digest manifest published next to the assets.
    pub manifest_name: String,
    /// Trusted base for control scripts and the config template.
    pub scripts_url: String,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Minimum time between progress lines.
    pub progress_interval: Duration,
    /// Behaviour when the digest manifest is unavailable.
    pub checksum_policy: ChecksumPolicy,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            scripts_url: DEFAULT_SCRIPTS_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            progress_interval: DEFAULT_INTERVAL,
            checksum_policy: ChecksumPolicy::default(),
        }
    }
}

impl HelperConfig {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> HelperResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)
            .map_err(|e| HelperError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_ini(&ini)
    }

    /// Parse settings from INI text.
    pub fn parse(text: &str) -> HelperResult<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| HelperError::InvalidConfig(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> HelperResult<Self> {
        let mut config = Self::default();
        let get = |section: &str, key: &str| {
            ini.section(Some(section))
                .and_then(|s| s.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("release", "api_url") {
            config.api_url = v.to_string();
        }
        if let Some(v) = get("release", "download_url") {
            config.download_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("release", "manifest_name") {
            config.manifest_name = v.to_string();
        }
        if let Some(v) = get("scripts", "base_url") {
            config.scripts_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("download", "timeout") {
            config.timeout = Duration::from_secs(parse_number("download.timeout", v)?);
        }
        if let Some(v) = get("download", "progress_interval_ms") {
            config.progress_interval =
                Duration::from_millis(parse_number("download.progress_interval_ms", v)?);
        }
        if let Some(v) = get("verify", "checksum_policy") {
            config.checksum_policy = ChecksumPolicy::parse(v).ok_or_else(|| {
                HelperError::InvalidConfig(format!(
                    "verify.checksum_policy must be 'skip' or 'strict', got '{}'",
                    v
                ))
            })?;
        }

        Ok(config)
    }

    /// Set the checksum policy.
    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    /// Set the release endpoints.
    pub fn with_release_urls(
        mut self,
        api_url: impl Into<String>,
        download_url: impl Into<String>,
    ) -> Self {
        self.api_url = api_url.into();
        self.download_url = download_url.into();
        self
    }

    /// Set the script base URL.
    pub fn with_scripts_url(mut self, url: impl Into<String>) -> Self {
        self.scripts_url = url.into();
        self
    }

    /// URL of a release asset.
    pub fn asset_url(&self, version: &str, asset: &str) -> String {
        format!("{}/{}/{}", self.download_url, version, asset)
    }

    /// URL of the digest manifest of a release.
    pub fn manifest_url(&self, version: &str) -> String {
        self.asset_url(version, &self.manifest_name)
    }

    /// URL of a file below the script base.
    pub fn script_url(&self, relative: &str) -> String {
        format!("{}/{}", self.scripts_url, relative.trim_start_matches('/'))
    }
}

fn parse_number(key: &str, value: &str) -> HelperResult<u64> {
    value.parse().map_err(|_| {
        HelperError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}
