//! Firmware version cache and local firmware freshness.
//!
//! The latest version is looked up in the release registry at most once per
//! TTL window. A local firmware file is kept next to the version it was
//! downloaded for; when the latest version moves on, the file is replaced.

mod github;
mod registry;
mod release;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{timeout, Instant};

use crate::config::{Config, RepoSlug, DEFAULT_FIRMWARE_VERSION};

pub use github::GitHubRegistry;
pub use registry::{RegistryError, ReleaseRegistry};
pub use release::{Release, ReleaseAsset};

/// Bound on release metadata lookups.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on firmware binary downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Largest firmware body accepted from the registry.
pub const MAX_DOWNLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Release assets with this suffix are firmware images.
pub const FIRMWARE_EXTENSION: &str = ".bin";

#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    #[error("release registry repository not configured")]
    NotConfigured,

    #[error("release {0} not found")]
    ReleaseNotFound(String),

    #[error("release {0} has no assets")]
    NoAssets(String),

    #[error("release {version} has no .bin asset (available: {available})")]
    NoBinaryAsset { version: String, available: String },

    #[error("downloaded firmware is empty")]
    EmptyDownload,

    #[error("firmware file not found at {}", .0.display())]
    Missing(PathBuf),

    #[error("update to {version} failed while waiting on it: {reason}")]
    AttemptFailed { version: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("firmware storage: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of making the latest firmware available locally.
#[derive(Debug)]
pub enum FirmwareStatus {
    /// Contents of the local file, read while it matched the requested version.
    Ready(Vec<u8>),
    /// No firmware can be served.
    Unavailable(FirmwareError),
    /// The file is in place but could not be read.
    Unreadable(FirmwareError),
}

#[derive(Debug, Default)]
struct FirmwareCache {
    latest_version: Option<String>,
    last_check: Option<Instant>,
    /// Version of the file on disk. `None` whenever no file exists.
    local_version: Option<String>,
    /// Bumped when a registry refresh finishes, successful or not.
    refresh_generation: u64,
    /// Bumped when an `ensure_available` attempt finishes.
    update_generation: u64,
    /// Version and reason of the last update attempt, if it failed.
    last_update_failure: Option<(String, String)>,
}

/// Firmware state shared by all update-check requests.
pub struct FirmwareService {
    registry: Arc<dyn ReleaseRegistry>,
    repo: Option<RepoSlug>,
    path: PathBuf,
    ttl: Duration,
    cache: Mutex<FirmwareCache>,
    refresh_lock: tokio::sync::Mutex<()>,
    update_lock: tokio::sync::Mutex<()>,
}

impl FirmwareService {
    pub fn new(config: &Config, registry: Arc<dyn ReleaseRegistry>) -> Self {
        Self {
            registry,
            repo: config.github_repo.clone(),
            path: config.firmware_path(),
            ttl: config.version_cache_ttl,
            cache: Mutex::new(FirmwareCache::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            update_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn firmware_path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Version of the firmware file on disk, if one is tracked.
    pub fn local_version(&self) -> Option<String> {
        self.cache().local_version.clone()
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, FirmwareCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_latest(&self) -> Option<String> {
        let cache = self.cache();
        match (&cache.latest_version, cache.last_check) {
            (Some(v), Some(at)) if at.elapsed() < self.ttl => Some(v.clone()),
            _ => None,
        }
    }

    fn fallback_version(&self) -> String {
        self.cache()
            .latest_version
            .clone()
            .unwrap_or_else(|| DEFAULT_FIRMWARE_VERSION.to_string())
    }

    /// Latest released firmware version. Never fails: on any registry problem
    /// the last known version (or the default) is returned.
    pub async fn latest_version(&self) -> String {
        if let Some(v) = self.fresh_latest() {
            tracing::debug!(version = %v, "Returning cached version");
            return v;
        }

        let Some(repo) = &self.repo else {
            tracing::warn!("GitHub repo not configured. Using default version.");
            return DEFAULT_FIRMWARE_VERSION.to_string();
        };

        // Callers queued behind a refresh reuse its outcome instead of
        // paying another timeout each.
        let seen = self.cache().refresh_generation;
        let _refresh = self.refresh_lock.lock().await;
        if let Some(v) = self.fresh_latest() {
            return v;
        }
        if self.cache().refresh_generation != seen {
            return self.fallback_version();
        }

        let fetched = self.fetch_latest(repo).await;
        self.cache().refresh_generation += 1;
        fetched.unwrap_or_else(|| self.fallback_version())
    }

    async fn fetch_latest(&self, repo: &RepoSlug) -> Option<String> {
        tracing::info!(repo = %repo, "Fetching latest release");
        match timeout(METADATA_TIMEOUT, self.registry.latest_release(repo)).await {
            Ok(Ok(release)) => match release.tag_name {
                Some(tag) => {
                    {
                        let mut cache = self.cache();
                        cache.latest_version = Some(tag.clone());
                        cache.last_check = Some(Instant::now());
                    }
                    tracing::info!(
                        version = %tag,
                        published = ?release.published_at,
                        "Latest version from GitHub"
                    );
                    return Some(tag);
                }
                None => tracing::warn!(repo = %repo, "Latest release has no tag name"),
            },
            Ok(Err(RegistryError::NotFound)) => {
                tracing::warn!(repo = %repo, "No releases found");
                tracing::warn!(
                    "Create your first release at: https://github.com/{}/releases/new",
                    repo
                );
            }
            Ok(Err(e)) => {
                tracing::error!(repo = %repo, "Failed to fetch latest version: {}", e);
            }
            Err(_) => {
                tracing::error!(
                    repo = %repo,
                    "Failed to fetch latest version: timed out after {:?}",
                    METADATA_TIMEOUT
                );
            }
        }
        None
    }

    pub async fn is_firmware_missing(&self) -> bool {
        let exists = tokio::fs::try_exists(self.firmware_path())
            .await
            .unwrap_or(false);
        tracing::debug!(exists, "Firmware file exists");
        !exists
    }

    /// True only if the file exists and was downloaded for `latest`.
    pub async fn is_firmware_up_to_date(&self, latest: &str) -> bool {
        if self.is_firmware_missing().await {
            tracing::debug!("No firmware file exists, not up to date");
            return false;
        }
        let local = self.local_version();
        let up_to_date = local.as_deref() == Some(latest);
        tracing::debug!(cached = ?local, latest, up_to_date, "Firmware up to date check");
        up_to_date
    }

    /// Remove the local firmware file. Missing file is not an error.
    pub async fn delete_old_firmware(&self) -> Result<(), FirmwareError> {
        let path = self.firmware_path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted old firmware file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.cache().local_version = None;
        Ok(())
    }

    /// Fetch the `.bin` asset of release `version` and store it as the local file.
    pub async fn download(&self, version: &str) -> Result<(), FirmwareError> {
        let Some(repo) = &self.repo else {
            tracing::warn!("Cannot download firmware: GitHub repo not configured");
            return Err(FirmwareError::NotConfigured);
        };
        tracing::info!(repo = %repo, version, "Downloading firmware release");

        let release = match timeout(METADATA_TIMEOUT, self.registry.release_by_tag(repo, version))
            .await
        {
            Ok(Ok(r)) => r,
            Ok(Err(RegistryError::NotFound)) => {
                tracing::error!(
                    "GitHub release '{}' not found. Please create a release at: https://github.com/{}/releases/new",
                    version,
                    repo
                );
                return Err(FirmwareError::ReleaseNotFound(version.to_string()));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RegistryError::Timeout(METADATA_TIMEOUT).into()),
        };

        if release.assets.is_empty() {
            tracing::error!(
                "GitHub release {} exists but has no assets. Please upload a {} file to the release.",
                version,
                FIRMWARE_EXTENSION
            );
            return Err(FirmwareError::NoAssets(version.to_string()));
        }
        let Some(asset) = release.find_asset(FIRMWARE_EXTENSION) else {
            let available = release.asset_names();
            tracing::error!(
                "GitHub release {} has no {} file. Available files: {}",
                version,
                FIRMWARE_EXTENSION,
                available
            );
            return Err(FirmwareError::NoBinaryAsset {
                version: version.to_string(),
                available,
            });
        };
        tracing::info!(name = %asset.name, size = asset.size, "Found firmware binary");

        let bytes = match timeout(
            DOWNLOAD_TIMEOUT,
            self.registry.fetch_bytes(&asset.browser_download_url),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => return Err(RegistryError::Timeout(DOWNLOAD_TIMEOUT).into()),
        };
        if bytes.is_empty() {
            return Err(FirmwareError::EmptyDownload);
        }

        let path = self.firmware_path();
        write_atomically(&path, &bytes).await?;
        self.cache().local_version = Some(version.to_string());
        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            version,
            "Firmware downloaded"
        );
        Ok(())
    }

    /// Make sure the local file holds firmware `latest`, replacing a stale
    /// one, and return its contents.
    ///
    /// A deletion is not undone if the following download fails. Callers that
    /// waited on a failed attempt for the same version get that failure back.
    pub async fn ensure_available(&self, latest: &str) -> FirmwareStatus {
        let seen = self.cache().update_generation;
        let _update = self.update_lock.lock().await;
        if let Some(reason) = self.failed_since(seen, latest) {
            tracing::warn!(version = latest, "Update attempt already failed: {}", reason);
            return FirmwareStatus::Unavailable(FirmwareError::AttemptFailed {
                version: latest.to_string(),
                reason,
            });
        }

        let status = match self.replace_stale(latest).await {
            Ok(()) => match self.read_firmware().await {
                Ok(bytes) => FirmwareStatus::Ready(bytes),
                Err(e) => FirmwareStatus::Unreadable(e),
            },
            Err(e) => FirmwareStatus::Unavailable(e),
        };

        let mut cache = self.cache();
        cache.update_generation += 1;
        cache.last_update_failure = match &status {
            FirmwareStatus::Unavailable(e) => Some((latest.to_string(), e.to_string())),
            _ => None,
        };
        drop(cache);
        status
    }

    fn failed_since(&self, seen: u64, version: &str) -> Option<String> {
        let cache = self.cache();
        if cache.update_generation == seen {
            return None;
        }
        match &cache.last_update_failure {
            Some((v, reason)) if v == version => Some(reason.clone()),
            _ => None,
        }
    }

    async fn replace_stale(&self, latest: &str) -> Result<(), FirmwareError> {
        if !self.is_firmware_up_to_date(latest).await {
            tracing::info!(
                version = latest,
                "Cached firmware is outdated or missing, replacing"
            );
            if let Err(e) = self.delete_old_firmware().await {
                tracing::error!("Failed to delete old firmware file: {}", e);
                return Err(e);
            }
        }

        if self.is_firmware_missing().await {
            tracing::warn!("Firmware file not found locally, attempting to download");
            if let Err(e) = self.download(latest).await {
                tracing::error!(version = latest, "Failed to download firmware: {}", e);
                tracing::error!("Or manually place firmware at {}", self.path.display());
                return Err(e);
            }
        }
        Ok(())
    }

    /// Read the local firmware file for serving.
    pub async fn read_firmware(&self) -> Result<Vec<u8>, FirmwareError> {
        let path = self.firmware_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(path = %path.display(), "Firmware file not found");
                Err(FirmwareError::Missing(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.part", file_name));
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp, path).await
}
