//! Event envelopes pushed to connected clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use upstep_core::{AccountStatus, Level, now_rfc3339};

/// Kinds of server-initiated notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Account record changed; payload is the account view
    UserUpdated,
    /// Client must end its session
    ForceLogout,
    /// Account moved to another coaching level
    LevelUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserUpdated => "user-updated",
            EventKind::ForceLogout => "force-logout",
            EventKind::LevelUpdated => "level-updated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire envelope: `{"type": kind, "payload": ..., "timestamp": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: String,
}

impl ServerEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: now_rfc3339(),
        }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Payload of `force-logout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceLogout {
    pub reason: String,
    /// Status name, or `"deleted"` when the account is gone
    pub new_status: String,
    pub timestamp: String,
}

impl ForceLogout {
    pub fn for_status(status: AccountStatus) -> Self {
        Self {
            reason: format!("account status changed to {status}"),
            new_status: status.as_str().to_string(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn for_deletion() -> Self {
        Self {
            reason: "account deleted".to_string(),
            new_status: "deleted".to_string(),
            timestamp: now_rfc3339(),
        }
    }
}

/// Payload of `level-updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChange {
    pub user_id: String,
    pub previous_level: Level,
    pub level: Level,
}
