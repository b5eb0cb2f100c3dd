//! Default server configuration.
//!
//! The template published next to the control scripts carries a fixed
//! client id and port. A fresh install replaces both with random values.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{HelperError, HelperResult};
use crate::platform::ScriptSource;

/// Template path below the script base.
pub const TEMPLATE_PATH: &str = "misc/config.json";

/// Client id placeholder in the template.
pub const TEMPLATE_ID: &str = "dbe16381-f905-4b88-946f-dfc21ed9be29";

/// Port placeholder in the template.
pub const TEMPLATE_PORT: &str = "12345";

/// Alter id written by the template.
pub const ALTER_ID: u32 = 64;

/// Random ports are drawn from this range.
pub const PORT_RANGE: std::ops::RangeInclusive<u16> = 50000..=65535;

const CONFIG_FILE: &str = "config.json";

/// Identity generated for a fresh install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCredentials {
    pub id: Uuid,
    pub port: u16,
}

impl ServerCredentials {
    /// Fresh UUID v4 and a port from [`PORT_RANGE`].
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4(),
            port: rand::rng().random_range(PORT_RANGE),
        }
    }
}

/// Substitute the placeholders of `template`.
pub fn render_template(template: &str, credentials: &ServerCredentials) -> String {
    // port first, a fresh uuid may itself contain the port placeholder
    template
        .replace(TEMPLATE_PORT, &credentials.port.to_string())
        .replace(TEMPLATE_ID, &credentials.id.to_string())
}

/// Write `<config_dir>/config.json` unless it exists.
///
/// # Returns
///
/// The generated credentials, or `None` when an existing config was kept.
pub fn scaffold_config(
    config_dir: &Path,
    scripts: &ScriptSource<'_>,
) -> HelperResult<Option<ServerCredentials>> {
    let config_path = config_dir.join(CONFIG_FILE);
    if config_path.exists() {
        info!("Keeping existing {}", config_path.display());
        return Ok(None);
    }

    let fetched = scripts.fetch(TEMPLATE_PATH, CONFIG_FILE)?;
    let template = fs::read_to_string(&fetched)
        .map_err(|e| HelperError::io("failed to read", &fetched, e))?;

    let credentials = ServerCredentials::generate();
    fs::create_dir_all(config_dir)
        .map_err(|e| HelperError::io("failed to create directory", config_dir, e))?;
    fs::write(&config_path, render_template(&template, &credentials))
        .map_err(|e| HelperError::io("failed to write", &config_path, e))?;
    debug!(path = %config_path.display(), "config written");

    Ok(Some(credentials))
}

/// Primary outbound IPv4 address, `127.0.0.1` when offline.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Log what a client needs to connect.
pub fn log_credentials(credentials: &ServerCredentials) {
    info!("Server address: {}", local_ip());
    info!("Port: {}", credentials.port);
    info!("ID: {}", credentials.id);
    info!("Alter ID: {}", ALTER_ID);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{ArtifactFetcher, DownloadTask};
    use proptest::prelude::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const TEMPLATE: &str = r#"{"inbounds":[{"port":12345,"settings":{"clients":[{"id":"dbe16381-f905-4b88-946f-dfc21ed9be29","alterId":64}]}}]}"#;

    struct TemplateFetcher {
        scratch: PathBuf,
        calls: AtomicUsize,
    }

    impl ArtifactFetcher for TemplateFetcher {
        fn fetch(&self, url: &str, dest_name: &str) -> HelperResult<PathBuf> {
            self.fetch_task(&DownloadTask::new(url, self.scratch.join(dest_name)))
        }

        fn fetch_task(&self, task: &DownloadTask) -> HelperResult<PathBuf> {
            assert!(task.url.ends_with("/misc/config.json"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::write(&task.destination, TEMPLATE).unwrap();
            Ok(task.destination.clone())
        }

        fn scratch_dir(&self) -> &Path {
            &self.scratch
        }
    }

    #[test]
    fn test_render_template() {
        let credentials = ServerCredentials {
            id: Uuid::nil(),
            port: 54321,
        };
        let rendered = render_template(TEMPLATE, &credentials);

        assert!(rendered.contains("\"port\":54321"));
        assert!(rendered.contains("00000000-0000-0000-0000-000000000000"));
        assert!(!rendered.contains(TEMPLATE_ID));
    }

    #[test]
    fn test_scaffold_writes_once() {
        let temp = TempDir::new().unwrap();
        let fetcher = TemplateFetcher {
            scratch: temp.path().to_path_buf(),
            calls: AtomicUsize::new(0),
        };
        let scripts = ScriptSource::new(&fetcher, "https://example.com");
        let config_dir = temp.path().join("etc/v2ray");

        let credentials = scaffold_config(&config_dir, &scripts).unwrap().unwrap();
        let written = fs::read_to_string(config_dir.join("config.json")).unwrap();
        assert!(written.contains(&credentials.id.to_string()));
        assert!(written.contains(&format!("\"port\":{}", credentials.port)));

        assert!(scaffold_config(&config_dir, &scripts).unwrap().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read_to_string(config_dir.join("config.json")).unwrap(), written);
    }

    #[test]
    fn test_local_ip_is_ipv4() {
        assert!(local_ip().is_ipv4());
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn generated_port_in_range(_seed in 0u8..32) {
                let credentials = ServerCredentials::generate();
                prop_assert!(PORT_RANGE.contains(&credentials.port));
                prop_assert_eq!(credentials.id.get_version_num(), 4);
            }
        }
    }
}
