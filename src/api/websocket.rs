use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::WsFrame;
use crate::domain::StatusUpdate;

/// Client-to-server messages. "ping" is the whole protocol.
#[derive(Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
}

/// GET /api/orders/:order_id/stream
///
/// Streams one order's updates until the client disconnects. Connecting does
/// not replay anything: the client sees updates published after this point.
pub async fn order_stream_handler(
    ws: WebSocketUpgrade,
    Path(order_id): Path<Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let rx = state.events.subscribe_order(order_id).await;
        info!(%order_id, "Order stream connected");
        handle_socket(socket, rx, WsFrame::connected(Some(order_id))).await;

        // Last subscriber gone: let the bus drop the per-order channel.
        state.events.prune_order(order_id);
        info!(%order_id, "Order stream closed");
    })
}

/// GET /api/orders/stream
///
/// Streams every order's updates to one client.
pub async fn global_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let rx = state.events.subscribe_all().await;
        info!("Global stream connected");
        handle_socket(socket, rx, WsFrame::connected(None)).await;
        info!("Global stream closed");
    })
}

/// Forward bus updates to the client and answer pings, until either side
/// drops. A closed bus (service shutdown) also ends the connection after the
/// subscriber drains its buffer.
async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<StatusUpdate>,
    greeting: WsFrame,
) {
    let (mut sender, mut receiver) = socket.split();

    if send_frame(&mut sender, &greeting).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => {
                    let frame = WsFrame::status_update(update);
                    if send_frame(&mut sender, &frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Stream subscriber lagged, oldest updates dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if is_ping(&text) && send_frame(&mut sender, &WsFrame::pong()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Protocol-level ping/pong is answered by axum itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &WsFrame,
) -> std::result::Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize stream frame: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await
}

fn is_ping(text: &str) -> bool {
    serde_json::from_str::<ClientMessage>(text)
        .map(|msg| msg.kind == "ping")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_detection_tolerates_garbage() {
        assert!(is_ping(r#"{"type":"ping"}"#));
        assert!(is_ping(r#"{"type":"ping","extra":1}"#));
        assert!(!is_ping(r#"{"type":"pong"}"#));
        assert!(!is_ping("not json"));
        assert!(!is_ping(""));
    }
}
