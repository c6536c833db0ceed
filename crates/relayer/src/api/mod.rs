//! HTTP API and WebSocket routes.

mod routes;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::firmware::FirmwareService;
use crate::relay::RelayState;

/// Shared app state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayState>,
    pub firmware: Arc<FirmwareService>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/count", get(routes::count))
        .route("/api/firmware/latest", get(routes::firmware_latest))
        .route("/ws", get(routes::ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
