//! Latest-release resolution against the upstream API.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::manifest::DigestManifest;
use crate::config::HelperConfig;
use crate::download::{ExpectedDigest, Transport};
use crate::error::{HelperError, HelperResult};
use crate::platform::PlatformProfile;

/// The release selected for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Release tag, e.g. `v4.23.0`.
    pub version: String,
    /// Asset for the host, `None` where assets are not used.
    pub asset_name: Option<String>,
    pub pre_release: bool,
}

impl ReleaseInfo {
    /// Asset name, or `UnsupportedPlatform` when the release has none.
    pub fn require_asset(&self) -> HelperResult<&str> {
        self.asset_name.as_deref().ok_or_else(|| {
            HelperError::UnsupportedPlatform(format!(
                "release {} carries no asset for this platform",
                self.version
            ))
        })
    }

    /// Suffix shown next to the version in the banner.
    pub fn pre_release_marker(&self) -> &'static str {
        if self.pre_release {
            "(pre release)"
        } else {
            ""
        }
    }
}

/// Source of release metadata.
pub trait ReleaseSource {
    /// Resolve the latest release for `profile`.
    fn latest(&self, profile: &PlatformProfile) -> HelperResult<ReleaseInfo>;

    /// Expected digest of the release asset.
    ///
    /// Any failure to obtain it is a [`HelperError::DigestFetchFailure`].
    fn expected_digest(&self, release: &ReleaseInfo) -> HelperResult<ExpectedDigest>;

    /// Download URL of the release asset.
    fn asset_url(&self, release: &ReleaseInfo) -> HelperResult<String>;
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
}

/// [`ReleaseSource`] backed by the release API and digest manifest.
pub struct ReleaseResolver {
    transport: Arc<dyn Transport>,
    config: HelperConfig,
}

impl ReleaseResolver {
    /// Create a resolver using the endpoints of `config`.
    pub fn new(transport: Arc<dyn Transport>, config: HelperConfig) -> Self {
        Self { transport, config }
    }

    /// Pick the asset for `profile` out of the release's asset names.
    ///
    /// Returns `None` for platforms that do not use release assets.
    pub fn search_asset<'a>(
        profile: &PlatformProfile,
        names: impl IntoIterator<Item = &'a str>,
    ) -> HelperResult<Option<String>> {
        if !profile.os_family.uses_release_assets() {
            debug!(os = %profile.os_family, "skipping asset search");
            return Ok(None);
        }

        let pattern = profile.asset_pattern();
        let suffix = format!("-{}", pattern);

        names
            .into_iter()
            .find(|name| *name == pattern || name.ends_with(&suffix))
            .map(|name| Some(name.to_string()))
            .ok_or_else(|| {
                HelperError::UnsupportedPlatform(format!("no release asset matches {}", pattern))
            })
    }
}

impl ReleaseSource for ReleaseResolver {
    fn latest(&self, profile: &PlatformProfile) -> HelperResult<ReleaseInfo> {
        let url = &self.config.api_url;
        let resolve_failure = |reason: String| HelperError::ResolveFailure {
            url: url.clone(),
            reason,
        };

        let body = self.transport.fetch_text(url).map_err(|e| match e {
            HelperError::DownloadFailure { reason, .. } => resolve_failure(reason),
            other => other,
        })?;

        let release: LatestRelease =
            serde_json::from_str(&body).map_err(|e| resolve_failure(e.to_string()))?;

        let asset_name =
            Self::search_asset(profile, release.assets.iter().map(|a| a.name.as_str()))?;
        debug!(tag = %release.tag_name, asset = ?asset_name, "resolved release");

        Ok(ReleaseInfo {
            version: release.tag_name,
            asset_name,
            pre_release: release.prerelease,
        })
    }

    fn expected_digest(&self, release: &ReleaseInfo) -> HelperResult<ExpectedDigest> {
        let url = self.config.manifest_url(&release.version);
        let asset = release.require_asset()?;
        let unavailable = |reason: String| HelperError::DigestFetchFailure {
            url: url.clone(),
            reason,
        };

        info!("Fetch metadata for version {}", release.version);
        let text = self.transport.fetch_text(&url).map_err(|e| unavailable(e.to_string()))?;

        let manifest = DigestManifest::parse(&text);
        let entry = manifest
            .entry(asset)
            .ok_or_else(|| unavailable(format!("no entry for {}", asset)))?;
        debug!(asset, "metadata found");

        entry
            .expected()
            .ok_or_else(|| unavailable(format!("entry for {} lists no digest", asset)))
    }

    fn asset_url(&self, release: &ReleaseInfo) -> HelperResult<String> {
        Ok(self
            .config
            .asset_url(&release.version, release.require_asset()?))
    }
}
