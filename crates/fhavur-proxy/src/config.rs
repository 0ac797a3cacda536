//! Proxy configuration management.
//!
//! This module handles loading and validating proxy configuration from CLI
//! arguments and environment variables, and merges it with the optional JSON
//! config file for the offline layer.
//!
//! # Configuration Sources
//!
//! Configuration can be provided via:
//! - CLI arguments (`--bind`, `--upstream`, etc.)
//! - Environment variables (`FHAVUR_PROXY_BIND`, etc.)
//! - Default values
//!
//! # Example
//!
//! ```no_run
//! use fhavur_proxy::ProxyConfig;
//!
//! let config = ProxyConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("Proxy will bind to: {}", config.bind);
//! println!("Upstream origin: {}", config.upstream);
//! ```

use crate::error::ConfigError;
use clap::Parser;
use fhavur_offline::OfflineConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Proxy configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fhavur-proxy",
    about = "Offline-first caching proxy for the Fhavur site",
    version
)]
pub struct ProxyConfig {
    /// HTTP bind address
    #[arg(long, env = "FHAVUR_PROXY_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Origin serving the site
    #[arg(
        long,
        env = "FHAVUR_PROXY_UPSTREAM",
        default_value = "http://localhost:3000"
    )]
    pub upstream: String,

    /// Directory for persistent cache storage (in-memory when unset)
    #[arg(long, env = "FHAVUR_PROXY_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// JSON file with offline layer settings
    #[arg(long, env = "FHAVUR_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache version override
    #[arg(long, env = "FHAVUR_PROXY_CACHE_VERSION")]
    pub cache_version: Option<String>,

    /// Initial log filter (`RUST_LOG` syntax)
    #[arg(long, env = "FHAVUR_PROXY_LOG", default_value = "info")]
    pub log: String,

    /// Upstream request timeout in seconds
    #[arg(long, env = "FHAVUR_PROXY_TIMEOUT", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl ProxyConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Upstream origin as a URL.
    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.upstream)
            .map_err(|_| ConfigError::InvalidUpstream(self.upstream.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidUpstream(self.upstream.clone()));
        }
        Ok(url)
    }

    /// Upstream request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Offline layer settings: the config file (or defaults) with the
    /// upstream origin as page origin and the version override applied.
    pub fn offline_config(&self) -> Result<OfflineConfig, ConfigError> {
        let mut offline = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::ReadFailed {
                        path: path.clone(),
                        source,
                    }
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::InvalidJson {
                    path: path.clone(),
                    source,
                })?
            }
            None => OfflineConfig::default(),
        };

        offline.page_origin = self.upstream_url()?.origin().ascii_serialization();
        if let Some(version) = &self.cache_version {
            offline.cache_version.clone_from(version);
        }
        Ok(offline)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The upstream is not an absolute http(s) URL
    /// - The timeout is zero
    /// - The cache directory path points at a file
    /// - The log filter does not parse
    /// - The merged offline settings are invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upstream_url()?;

        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if let Some(dir) = &self.cache_dir
            && dir.exists()
            && !dir.is_dir()
        {
            return Err(ConfigError::NotADirectory(dir.clone()));
        }

        EnvFilter::try_new(&self.log).map_err(|e| ConfigError::InvalidLogFilter {
            filter: self.log.clone(),
            reason: e.to_string(),
        })?;

        self.offline_config()?.validate()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config(args: &[&str]) -> ProxyConfig {
        let mut argv = vec!["fhavur-proxy"];
        if !args.contains(&"--upstream") {
            argv.extend(["--upstream", "http://127.0.0.1:3000"]);
        }
        argv.extend_from_slice(args);
        ProxyConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        let config = config(&[]);
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_upstream_becomes_page_origin() {
        let config = config(&["--cache-version", "v9"]);
        let offline = config.offline_config().unwrap();
        assert_eq!(offline.page_origin, "http://127.0.0.1:3000");
        assert_eq!(offline.cache_version, "v9");
        assert_eq!(offline.cache_prefix, "fhavur");
    }

    #[test]
    fn test_config_file_merged() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"cache_version": "v7", "static_cache_limit": 12}"#)
            .unwrap();

        let config = config(&["--config", file.path().to_str().unwrap()]);
        let offline = config.offline_config().unwrap();
        assert_eq!(offline.cache_version, "v7");
        assert_eq!(offline.static_cache_limit, 12);
        assert_eq!(offline.page_origin, "http://127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            config(&["--upstream", "ftp://example.com"]).validate(),
            Err(ConfigError::InvalidUpstream(_))
        ));
        assert!(matches!(
            config(&["--timeout-secs", "0"]).validate(),
            Err(ConfigError::ZeroTimeout)
        ));
        assert!(matches!(
            config(&["--cache-version", "v 2"]).validate(),
            Err(ConfigError::Offline(_))
        ));

        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            config(&["--cache-dir", file.path().to_str().unwrap()]).validate(),
            Err(ConfigError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_broken_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let config = config(&["--config", file.path().to_str().unwrap()]);
        assert!(matches!(
            config.offline_config(),
            Err(ConfigError::InvalidJson { .. })
        ));
    }
}
