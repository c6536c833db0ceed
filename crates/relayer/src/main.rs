//! Bell relayer: HTTP + WebSocket server.
//!
//! Optional env: HOST, PORT, FIRMWARE_GITHUB_REPO, FIRMWARE_STORAGE_PATH,
//! FIRMWARE_FILENAME, GITHUB_API_URL, GITHUB_TOKEN, VERSION_CACHE_TTL_MS

use std::sync::Arc;

use relayer::{api, config, firmware, relay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    match &config.github_repo {
        Some(repo) => tracing::info!(repo = %repo, "Firmware releases from GitHub"),
        None => tracing::warn!(
            "FIRMWARE_GITHUB_REPO not set; latest version defaults to {}",
            config::DEFAULT_FIRMWARE_VERSION
        ),
    }

    let registry = Arc::new(firmware::GitHubRegistry::from_config(&config)?);
    let firmware = Arc::new(firmware::FirmwareService::new(&config, registry));
    let relay = Arc::new(relay::RelayState::new(Arc::new(
        relay::ConnectionRegistry::new(),
    )));

    let addr: std::net::SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = api::AppState { relay, firmware };
    let app = api::router(state);

    tracing::info!("Relayer listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
