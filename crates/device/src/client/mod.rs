//! Relayer clients: WebSocket events and HTTP firmware checks.

mod update;
mod ws;

pub use update::{check_update, UpdateOutcome};
pub use ws::{describe_frame, press_button, run_listener};

/// Derive the WebSocket endpoint from the relayer's HTTP base URL.
pub fn ws_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = base
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/ws", base)
}
