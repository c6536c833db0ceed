//! Release registry seam.

use std::time::Duration;

use async_trait::async_trait;

use super::release::Release;
use crate::config::RepoSlug;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found")]
    NotFound,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// External service that publishes tagged releases with binary assets.
#[async_trait]
pub trait ReleaseRegistry: Send + Sync {
    /// Most recent published release of `repo`.
    async fn latest_release(&self, repo: &RepoSlug) -> Result<Release, RegistryError>;

    /// Release with exactly this tag.
    async fn release_by_tag(&self, repo: &RepoSlug, tag: &str) -> Result<Release, RegistryError>;

    /// Body of an asset download URL.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RegistryError>;
}
