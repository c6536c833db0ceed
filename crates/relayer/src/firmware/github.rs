//! GitHub releases API client.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{redirect, Client, StatusCode, Url};

use super::registry::{RegistryError, ReleaseRegistry};
use super::release::Release;
use super::{DOWNLOAD_TIMEOUT, MAX_DOWNLOAD_BYTES, METADATA_TIMEOUT};
use crate::config::{Config, RepoSlug};

const USER_AGENT: &str = concat!("bell-relayer/", env!("CARGO_PKG_VERSION"));

/// Talks to `api.github.com` (or a compatible base URL).
pub struct GitHubRegistry {
    api: Client,
    download: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubRegistry {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, RegistryError> {
        let api = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(METADATA_TIMEOUT)
            .build()?;
        let download = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            api,
            download,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        Self::new(&config.github_api_url, config.github_token.clone())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| RegistryError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_release(&self, url: Url) -> Result<Release, RegistryError> {
        tracing::debug!(%url, "GET release");
        let mut req = self
            .api
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let res = req
            .send()
            .await
            .map_err(|e| classify(e, METADATA_TIMEOUT))?;
        match res.status() {
            StatusCode::NOT_FOUND => return Err(RegistryError::NotFound),
            s if !s.is_success() => return Err(RegistryError::Status(s.as_u16())),
            _ => {}
        }
        let body = res
            .bytes()
            .await
            .map_err(|e| classify(e, METADATA_TIMEOUT))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ReleaseRegistry for GitHubRegistry {
    async fn latest_release(&self, repo: &RepoSlug) -> Result<Release, RegistryError> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "releases", "latest"])?;
        self.get_release(url).await
    }

    async fn release_by_tag(&self, repo: &RepoSlug, tag: &str) -> Result<Release, RegistryError> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "releases", "tags", tag])?;
        self.get_release(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RegistryError> {
        tracing::info!(url, "Downloading firmware");
        let mut res = self
            .download
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, DOWNLOAD_TIMEOUT))?;
        let status = res.status();
        if !status.is_success() {
            tracing::error!("Failed to download firmware: HTTP {}", status);
            return Err(RegistryError::Status(status.as_u16()));
        }
        if res
            .content_length()
            .is_some_and(|len| len > MAX_DOWNLOAD_BYTES as u64)
        {
            return Err(RegistryError::TooLarge {
                limit: MAX_DOWNLOAD_BYTES,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|e| classify(e, DOWNLOAD_TIMEOUT))?
        {
            if body.len() + chunk.len() > MAX_DOWNLOAD_BYTES {
                return Err(RegistryError::TooLarge {
                    limit: MAX_DOWNLOAD_BYTES,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn classify(e: reqwest::Error, timeout: std::time::Duration) -> RegistryError {
    if e.is_timeout() {
        RegistryError::Timeout(timeout)
    } else {
        RegistryError::Http(e)
    }
}
