//! Realtime routes: the WebSocket endpoint and operator tools.

use axum::{
    Json,
    extract::{Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::events::EventKind;
use super::websocket::{TransportSettings, handle_socket};
use crate::admin::OperatorToken;
use crate::extract::ApiJson;
use crate::server::AppState;

/// Body of the direct-trigger test endpoints.
#[derive(Debug, Deserialize)]
pub struct TestEventRequest {
    #[serde(rename = "type", default = "default_test_kind")]
    pub kind: EventKind,
    #[serde(default)]
    pub payload: Option<Value>,
}

fn default_test_kind() -> EventKind {
    EventKind::UserUpdated
}

impl TestEventRequest {
    fn payload(self) -> (EventKind, Value) {
        let payload = self
            .payload
            .unwrap_or_else(|| json!({ "message": "test notification" }));
        (self.kind, payload)
    }
}

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let settings = TransportSettings {
        channel_capacity: state.config.realtime.channel_capacity,
        heartbeat: state.config.realtime.heartbeat(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, registry, settings))
}

pub async fn list_connections(
    _token: OperatorToken,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let entries = state.registry.snapshot();
    Json(json!({
        "success": true,
        "connections": state.registry.connection_count(),
        "count": entries.len(),
        "data": entries,
    }))
}

pub async fn test_notify_user(
    _token: OperatorToken,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<TestEventRequest>,
) -> impl IntoResponse {
    let (kind, payload) = body.payload();
    let report = state.notifier.notify_user(&user_id, kind, payload);
    tracing::info!(user_id = %user_id, event_type = %kind, delivered = report.delivered, "test notification sent");
    Json(json!({ "success": true, "data": report }))
}

pub async fn test_notify_all(
    _token: OperatorToken,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TestEventRequest>,
) -> impl IntoResponse {
    let (kind, payload) = body.payload();
    let report = state.notifier.notify_all(kind, payload);
    tracing::info!(event_type = %kind, delivered = report.delivered, "test broadcast sent");
    Json(json!({ "success": true, "data": report }))
}
