//! WebSocket endpoint for viewers.

use crate::hub::HubHandle;
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use tandem_core::ClientMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, state.cancel_token))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, cancel_token: CancellationToken) {
    let mut connection = match hub.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            warn!("Refusing WebSocket connection: {}", e);
            return;
        }
    };
    let id = connection.id;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            // Broadcasts from the hub, in the order the hub produced them
            outgoing = connection.outbox.recv() => {
                let Some(message) = outgoing else {
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode {} for {}: {}", message.kind(), id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(message) => {
                                debug!("Received {} from {}", message.kind(), id);
                                if hub.dispatch(id, message).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Dropping malformed message from {}: {}", id, e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = hub.disconnect(id).await;
}
