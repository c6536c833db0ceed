//! Release metadata as returned by the GitHub releases API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tagged release. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub browser_download_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Release {
    /// First asset whose name ends with `extension`.
    pub fn find_asset(&self, extension: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(extension))
    }

    pub fn asset_names(&self) -> String {
        if self.assets.is_empty() {
            return "none".to_string();
        }
        self.assets
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_github_release_payload() {
        let raw = r#"{
            "url": "https://api.github.com/repos/o/r/releases/1",
            "tag_name": "v1.0.1",
            "name": "Bell 1.0.1",
            "draft": false,
            "prerelease": false,
            "created_at": "2025-03-01T10:00:00Z",
            "published_at": "2025-03-01T10:05:00Z",
            "assets": [
                {
                    "name": "firmware.bin",
                    "size": 912384,
                    "browser_download_url": "https://github.com/o/r/releases/download/v1.0.1/firmware.bin",
                    "content_type": "application/octet-stream",
                    "state": "uploaded"
                }
            ],
            "body": "notes"
        }"#;
        let release: Release = serde_json::from_str(raw).unwrap();
        assert_eq!(release.tag_name.as_deref(), Some("v1.0.1"));
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 912384);
        assert!(release.published_at.is_some());
    }

    #[test]
    fn find_asset_picks_first_matching_extension() {
        let asset = |name: &str| ReleaseAsset {
            name: name.to_string(),
            size: 1,
            browser_download_url: format!("https://example.invalid/{}", name),
            content_type: None,
        };
        let release = Release {
            tag_name: Some("v2".to_string()),
            assets: vec![asset("notes.txt"), asset("bell.bin"), asset("other.bin")],
            ..Default::default()
        };
        assert_eq!(release.find_asset(".bin").unwrap().name, "bell.bin");
        assert_eq!(release.asset_names(), "notes.txt, bell.bin, other.bin");
        assert!(release.find_asset(".hex").is_none());
    }
}
