//! WebSocket transport.
//!
//! Each socket is registered on open and removed on close. Clients
//! identify themselves with `{"type":"identify","userId":"..."}`; events
//! queued through the registry handle are forwarded as text frames.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::{Instant, interval_at};
use upstep_core::now_rfc3339;

use super::registry::{ConnectionHandle, ConnectionRegistry, OutboundMessage};

/// Frames a client may send.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Identify {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Ping,
}

/// Per-socket transport settings.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    pub channel_capacity: usize,
    pub heartbeat: Duration,
}

fn control_frame(kind: &str, payload: Value) -> String {
    json!({
        "type": kind,
        "payload": payload,
        "timestamp": now_rfc3339(),
    })
    .to_string()
}

/// Apply one client text frame; returns the reply to send, if any.
fn handle_client_text(registry: &ConnectionRegistry, connection_id: &str, text: &str) -> String {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Identify { user_id }) => {
            let user_id = user_id.trim();
            if user_id.is_empty() {
                return control_frame("error", json!({ "message": "userId is required" }));
            }
            if registry.identify(connection_id, user_id) {
                tracing::info!(connection_id, user_id, "client identified");
            }
            control_frame(
                "identified",
                json!({ "userId": user_id, "connectionId": connection_id }),
            )
        }
        Ok(ClientMessage::Ping) => control_frame("pong", Value::Null),
        Err(e) => {
            tracing::debug!(connection_id, error = %e, "unrecognized client frame");
            control_frame("error", json!({ "message": "unrecognized message" }))
        }
    }
}

/// Drive one WebSocket connection until either side closes it.
pub async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    settings: TransportSettings,
) {
    let (handle, mut rx) = ConnectionHandle::channel(settings.channel_capacity);
    let connection = registry.register(handle);
    let connection_id = connection.id().to_string();

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    let greeting = control_frame("connected", json!({ "connectionId": connection_id }));
    if let Err(e) = sender.send(Message::Text(greeting.into())).await {
        tracing::debug!(error = %e, "Failed to send greeting");
        registry.remove(&connection_id);
        return;
    }

    let mut heartbeat = interval_at(Instant::now() + settings.heartbeat, settings.heartbeat);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "Client closed WebSocket");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            tracing::debug!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_text(&registry, &connection_id, text.as_str());
                        if let Err(e) = sender.send(Message::Text(reply.into())).await {
                            tracing::debug!(error = %e, "Failed to send reply");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            out = rx.recv() => {
                match out {
                    Some(OutboundMessage::Text(text)) => {
                        if let Err(e) = sender.send(Message::Text(text.into())).await {
                            tracing::debug!(error = %e, "Failed to send event");
                            break;
                        }
                    }
                    None => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = sender.send(Message::Ping(Default::default())).await {
                    tracing::debug!(error = %e, "Failed to send heartbeat");
                    break;
                }
            }
        }
    }

    registry.remove(&connection_id);

    tracing::info!(connection_id = %connection_id, "WebSocket connection closed");
}
