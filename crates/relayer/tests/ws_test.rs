//! Integration tests for WebSocket fan-out over a real listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relayer::api::{router, AppState};
use relayer::config::Config;
use relayer::firmware::{FirmwareService, GitHubRegistry};
use relayer::relay::{ConnectionRegistry, RelayState};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsRead = futures_util::stream::SplitStream<WsStream>;

async fn spawn_server(dir: &std::path::Path) -> (SocketAddr, AppState) {
    let config = Config::for_test(dir);
    let registry = Arc::new(GitHubRegistry::from_config(&config).unwrap());
    let state = AppState {
        relay: Arc::new(RelayState::new(Arc::new(ConnectionRegistry::new()))),
        firmware: Arc::new(FirmwareService::new(&config, registry)),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    ws
}

async fn wait_for_connections(state: &AppState, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while state.relay.registry().len() != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection count never settled");
}

/// Next text frame, skipping control frames. None on timeout.
async fn next_text(read: &mut WsRead, wait: Duration) -> Option<String> {
    loop {
        match tokio::time::timeout(wait, read.next()).await {
            Ok(Some(Ok(Message::Text(t)))) => return Some(t),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

/// Drain the "Client connected" announcements sent on connect.
async fn drain_announcements(read: &mut WsRead) {
    while let Some(t) = next_text(read, Duration::from_millis(200)).await {
        assert!(t.starts_with("Client connected: "), "unexpected frame {t}");
    }
}

#[tokio::test]
async fn pressed_event_reaches_every_client() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, state) = spawn_server(dir.path()).await;

    let (mut a_tx, mut a_rx) = connect(addr).await.split();
    let (_b_tx, mut b_rx) = connect(addr).await.split();
    wait_for_connections(&state, 2).await;
    drain_announcements(&mut a_rx).await;
    drain_announcements(&mut b_rx).await;

    let frame = serde_json::json!({
        "buttonEvent": "PRESSED",
        "deviceId": "bell-1",
        "firmwareVersion": "v1.0.0"
    });
    a_tx.send(Message::Text(frame.to_string())).await.unwrap();

    for read in [&mut a_rx, &mut b_rx] {
        let got = next_text(read, Duration::from_secs(2)).await.unwrap();
        let got: serde_json::Value = serde_json::from_str(&got).unwrap();
        assert_eq!(got, frame);
    }
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, state) = spawn_server(dir.path()).await;

    let (mut a_tx, mut a_rx) = connect(addr).await.split();
    let (_b_tx, mut b_rx) = connect(addr).await.split();
    wait_for_connections(&state, 2).await;
    drain_announcements(&mut a_rx).await;
    drain_announcements(&mut b_rx).await;

    a_tx.send(Message::Text("{not json".to_string())).await.unwrap();
    a_tx.send(Message::Text(r#"{"buttonEvent":"HELD","deviceId":"bell-1"}"#.to_string()))
        .await
        .unwrap();
    a_tx.send(Message::Text(r#"{"buttonEvent":"RELEASED","deviceId":"bell-1"}"#.to_string()))
        .await
        .unwrap();

    let got = next_text(&mut b_rx, Duration::from_secs(2)).await.unwrap();
    let got: serde_json::Value = serde_json::from_str(&got).unwrap();
    assert_eq!(got["buttonEvent"], "RELEASED");
    assert_eq!(got["deviceId"], "bell-1");
    assert_eq!(state.relay.registry().len(), 2);
}

#[tokio::test]
async fn closed_client_is_unregistered() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, state) = spawn_server(dir.path()).await;

    let mut a = connect(addr).await;
    let (_b_tx, mut b_rx) = connect(addr).await.split();
    wait_for_connections(&state, 2).await;
    drain_announcements(&mut b_rx).await;

    a.close(None).await.unwrap();
    wait_for_connections(&state, 1).await;

    let body = reqwest::get(format!("http://{}/count", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"{"count":1}"#);
}
