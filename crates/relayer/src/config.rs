//! Configuration for the relayer.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default latest version when the registry cannot be consulted.
pub const DEFAULT_FIRMWARE_VERSION: &str = "v1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FIRMWARE_GITHUB_REPO must look like owner/name, got {0:?}")]
    InvalidRepo(String),
}

/// Release registry repository, `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let mut parts = s.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ConfigError::InvalidRepo(s.to_string())),
        }
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Relayer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub github_repo: Option<RepoSlug>,
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub firmware_storage_path: PathBuf,
    pub firmware_filename: String,
    pub version_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let github_repo = match std::env::var("FIRMWARE_GITHUB_REPO") {
            Ok(s) if !s.trim().is_empty() => Some(RepoSlug::parse(&s)?),
            _ => None,
        };
        let github_api_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        let firmware_storage_path = std::env::var("FIRMWARE_STORAGE_PATH")
            .map(|s| PathBuf::from(shellexpand::tilde(&s).to_string()))
            .unwrap_or_else(|_| PathBuf::from("./firmware"));
        let firmware_filename =
            std::env::var("FIRMWARE_FILENAME").unwrap_or_else(|_| "firmware.bin".to_string());
        let version_cache_ttl_ms: u64 = std::env::var("VERSION_CACHE_TTL_MS")
            .unwrap_or_else(|_| "60000".to_string())
            .parse()
            .unwrap_or(60_000);

        Ok(Self {
            host,
            port,
            github_repo,
            github_api_url,
            github_token,
            firmware_storage_path,
            firmware_filename,
            version_cache_ttl: Duration::from_millis(version_cache_ttl_ms),
        })
    }

    /// Config with firmware stored under `storage_dir` and no registry repo.
    pub fn for_test(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            github_repo: None,
            github_api_url: "http://127.0.0.1:1".to_string(),
            github_token: None,
            firmware_storage_path: storage_dir.as_ref().to_path_buf(),
            firmware_filename: "firmware.bin".to_string(),
            version_cache_ttl: Duration::from_millis(60_000),
        }
    }

    pub fn firmware_path(&self) -> PathBuf {
        self.firmware_storage_path.join(&self.firmware_filename)
    }
}
