//! WebSocket client for sending and watching button events.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use shared::{ButtonEvent, ButtonEventKind};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Human-readable line for one broadcast frame.
pub fn describe_frame(text: &str) -> String {
    match serde_json::from_str::<ButtonEvent>(text) {
        Ok(ev) if ev.button_event.is_some() => format!(
            "{} from {} ({})",
            ev.button_event.map(|k| k.as_str()).unwrap_or("?"),
            ev.device_id.as_deref().unwrap_or("unknown"),
            ev.firmware_version.as_deref().unwrap_or("unknown"),
        ),
        _ => text.to_string(),
    }
}

/// Print every broadcast until interrupted, reconnecting after failures.
pub async fn run_listener(ws_url: &str) -> Result<()> {
    loop {
        match connect_async(ws_url).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to relayer");
                let (_, mut rx) = ws.split();
                while let Some(msg) = rx.next().await {
                    match msg {
                        Ok(Message::Text(t)) => {
                            println!(
                                "[{}] {}",
                                chrono::Local::now().format("%H:%M:%S"),
                                describe_frame(&t)
                            );
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Connection error: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
    }
}

/// Send PRESSED, wait `hold_ms`, send RELEASED, then close.
pub async fn press_button(
    ws_url: &str,
    device_id: &str,
    firmware_version: &str,
    hold_ms: u64,
) -> Result<()> {
    let (ws, _) = connect_async(ws_url).await?;
    let (mut tx, _rx) = ws.split();

    for (i, kind) in [ButtonEventKind::Pressed, ButtonEventKind::Released]
        .into_iter()
        .enumerate()
    {
        if i > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(hold_ms)).await;
        }
        let event = ButtonEvent::new(kind, device_id, firmware_version);
        tx.send(Message::Text(serde_json::to_string(&event)?))
            .await?;
        tracing::info!(device_id, event = kind.as_str(), "Sent button event");
    }

    tx.send(Message::Close(None)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_frame_formats_button_events() {
        let text = r#"{"buttonEvent":"PRESSED","deviceId":"bell-2","firmwareVersion":"v1.0.1"}"#;
        assert_eq!(describe_frame(text), "PRESSED from bell-2 (v1.0.1)");
    }

    #[test]
    fn describe_frame_passes_through_plain_text() {
        assert_eq!(
            describe_frame("Client connected: 1234"),
            "Client connected: 1234"
        );
        assert_eq!(describe_frame(r#"{"deviceId":"x"}"#), r#"{"deviceId":"x"}"#);
    }
}
