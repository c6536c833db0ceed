//! Firmware update check against the relayer.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use shared::headers;

/// What the relayer answered to an update check.
#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated { version: String, bytes: usize },
    Unavailable(String),
}

/// GET /api/firmware/latest as a device would, saving a served image to `out`.
pub async fn check_update(
    base_url: &str,
    version: Option<&str>,
    mac: Option<&str>,
    out: &Path,
) -> Result<UpdateOutcome> {
    let url = format!("{}/api/firmware/latest", base_url.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let mut req = client.get(&url);
    if let Some(v) = version {
        req = req.header(headers::DEVICE_VERSION, v);
    }
    if let Some(m) = mac {
        req = req.header(headers::DEVICE_MAC, m);
    }
    let res = req.send().await?;

    match res.status() {
        StatusCode::NOT_MODIFIED => Ok(UpdateOutcome::UpToDate),
        StatusCode::OK => {
            let latest = res
                .headers()
                .get(headers::LATEST_VERSION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            let body = res.bytes().await?;
            if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(out, &body)
                .await
                .with_context(|| format!("write {}", out.display()))?;
            tracing::info!(version = %latest, bytes = body.len(), "Saved firmware image");
            Ok(UpdateOutcome::Updated {
                version: latest,
                bytes: body.len(),
            })
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            let reason = res
                .headers()
                .get(headers::FIRMWARE_ERROR)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("no reason given")
                .to_string();
            Ok(UpdateOutcome::Unavailable(reason))
        }
        s => {
            let reason = res
                .headers()
                .get(headers::FIRMWARE_ERROR)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            anyhow::bail!("relayer returned {} {}", s, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one request with `response`, handing back the raw request text.
    async fn one_shot_server(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut request = Vec::new();
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            sock.write_all(response).await.unwrap();
            sock.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_lowercase()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn not_modified_means_up_to_date() {
        let (base, server) =
            one_shot_server(b"HTTP/1.1 304 Not Modified\r\nconnection: close\r\n\r\n").await;
        let dir = tempfile::tempdir().unwrap();

        let outcome = check_update(&base, Some("v1.0.1"), Some("AA:BB"), &dir.path().join("fw.bin"))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::UpToDate);
        let request = server.await.unwrap();
        assert!(request.contains("x-esp32-version: v1.0.1"));
        assert!(request.contains("x-esp32-mac: aa:bb"));
    }

    #[tokio::test]
    async fn served_image_is_saved() {
        let (base, _server) = one_shot_server(
            b"HTTP/1.1 200 OK\r\nx-latest-version: v1.0.2\r\ncontent-type: application/octet-stream\r\ncontent-length: 5\r\nconnection: close\r\n\r\nIMAGE",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("fw.bin");

        let outcome = check_update(&base, Some("v1.0.0"), None, &out).await.unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                version: "v1.0.2".to_string(),
                bytes: 5
            }
        );
        assert_eq!(std::fs::read(&out).unwrap(), b"IMAGE");
    }

    #[tokio::test]
    async fn unavailable_carries_reason() {
        let (base, _server) = one_shot_server(
            b"HTTP/1.1 503 Service Unavailable\r\nx-firmware-error: nothing to serve\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();

        let outcome = check_update(&base, None, None, &dir.path().join("fw.bin"))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Unavailable("nothing to serve".to_string()));
    }
}
