//! Route handlers.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};

use shared::{headers, CountResponse};

use crate::api::AppState;
use crate::firmware::FirmwareStatus;
use crate::relay::Connection;

const PING_INTERVAL_SECS: u64 = 30;

pub async fn count(State(state): State<AppState>) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.relay.registry().len(),
    })
}

// --- WebSocket ---

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register the connection, forward relay output to it, and feed its text
/// frames to the relay until it closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (conn, mut rx) = Connection::open();
    let conn_id = conn.id().to_string();

    let mut ping_interval =
        tokio::time::interval(tokio::time::Duration::from_secs(PING_INTERVAL_SECS));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                out = rx.recv() => {
                    let Some(text) = out else { break };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    state.relay.connect(conn);

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.relay.handle_frame(&conn_id, text.as_str());
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    state.relay.disconnect(&conn_id);
    writer.abort();
}

// --- Firmware ---

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Update check. 304 when the device already runs the latest version,
/// otherwise the latest firmware binary (or 503 if none can be had).
pub async fn firmware_latest(State(state): State<AppState>, req_headers: HeaderMap) -> Response {
    let current = header_str(&req_headers, headers::DEVICE_VERSION);
    let mac = header_str(&req_headers, headers::DEVICE_MAC).unwrap_or("unknown");
    tracing::info!(
        mac,
        current = current.unwrap_or("unknown"),
        "Firmware update check"
    );

    let latest = state.firmware.latest_version().await;
    if current == Some(latest.as_str()) {
        tracing::info!(mac, version = %latest, "Device is up to date");
        return StatusCode::NOT_MODIFIED.into_response();
    }
    tracing::info!(
        mac,
        "Device needs update from {} to {}",
        current.unwrap_or("unknown"),
        latest
    );

    match state.firmware.ensure_available(&latest).await {
        FirmwareStatus::Ready(bytes) => {
            tracing::info!(mac, bytes = bytes.len(), "Serving firmware update");
            (
                StatusCode::OK,
                [
                    (headers::LATEST_VERSION, latest),
                    (
                        header::CONTENT_TYPE.as_str(),
                        "application/octet-stream".to_string(),
                    ),
                    (header::CONTENT_LENGTH.as_str(), bytes.len().to_string()),
                ],
                bytes,
            )
                .into_response()
        }
        FirmwareStatus::Unavailable(e) => {
            tracing::warn!(version = %latest, "No firmware available: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(
                    headers::FIRMWARE_ERROR,
                    "No firmware available. Create GitHub release or add local firmware.bin",
                )],
            )
                .into_response()
        }
        FirmwareStatus::Unreadable(e) => {
            tracing::error!("Error serving firmware: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(headers::FIRMWARE_ERROR, "Internal error serving firmware")],
            )
                .into_response()
        }
    }
}
