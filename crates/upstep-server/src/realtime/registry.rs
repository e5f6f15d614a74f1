//! Process-wide registry of live client connections.
//!
//! Two maps live behind one lock: every open connection by ID, and the
//! identified user → connection mapping. Holding both under the same
//! `RwLock` keeps `identify` and `remove` for one connection from
//! interleaving, and no operation awaits while holding it.
//!
//! A user maps to at most one connection. Identifying a second connection
//! for the same user supersedes the first: the older connection stays open
//! and still receives broadcasts to everyone, but user-targeted events go
//! to the newest one only.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use upstep_core::format_rfc3339;
use uuid::Uuid;

/// Message queued for a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Serialized JSON frame
    Text(String),
}

/// Why a message could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("connection is closed")]
    Closed,
}

/// Handle for queueing messages to one transport session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: String,
    sender: mpsc::Sender<OutboundMessage>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh connection ID and its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, rx) = mpsc::channel(capacity);
        let handle = Self {
            id: Uuid::new_v4().to_string(),
            sender,
        };
        (handle, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a message without waiting for space.
    pub fn try_send(&self, message: OutboundMessage) -> Result<(), SendFailure> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendFailure::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }
}

/// A live connection as seen by the registry.
#[derive(Debug, Clone)]
pub struct Connection {
    pub user_id: Option<String>,
    pub connected_at: OffsetDateTime,
    handle: ConnectionHandle,
}

impl Connection {
    pub fn id(&self) -> &str {
        self.handle.id()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

/// Observability row for one identified user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub user_id: String,
    pub connection_id: String,
    pub connected_at: String,
}

#[derive(Default)]
struct RegistryState {
    /// Connection ID -> connection
    connections: HashMap<String, Connection>,
    /// User ID -> connection ID
    users: HashMap<String, String>,
}

/// Registry of open connections and the users identified on them.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened, not yet identified connection.
    pub fn register(&self, handle: ConnectionHandle) -> Connection {
        let connection = Connection {
            user_id: None,
            connected_at: OffsetDateTime::now_utc(),
            handle,
        };
        let total = {
            let mut state = self.state.write();
            state
                .connections
                .insert(connection.id().to_string(), connection.clone());
            state.connections.len()
        };
        crate::metrics::set_realtime_connections(total);

        tracing::debug!(connection_id = %connection.id(), "connection registered");
        connection
    }

    /// Associate `user_id` with a connection, superseding any earlier
    /// connection for that user.
    ///
    /// Returns `false` if the connection is not open (already removed).
    pub fn identify(&self, connection_id: &str, user_id: &str) -> bool {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(connection) = state.connections.get_mut(connection_id) else {
            tracing::debug!(connection_id, user_id, "identify for unknown connection ignored");
            return false;
        };

        // Re-identifying as another user releases the old mapping
        if let Some(previous_user) = connection.user_id.replace(user_id.to_string())
            && previous_user != user_id
            && state.users.get(&previous_user).map(String::as_str) == Some(connection_id)
        {
            state.users.remove(&previous_user);
        }

        if let Some(superseded) = state
            .users
            .insert(user_id.to_string(), connection_id.to_string())
            && superseded != connection_id
        {
            if let Some(old) = state.connections.get_mut(&superseded) {
                old.user_id = None;
            }
            tracing::debug!(
                user_id,
                connection_id,
                superseded_connection_id = %superseded,
                "user re-identified on a new connection"
            );
        }

        tracing::debug!(connection_id, user_id, "connection identified");
        true
    }

    /// Drop a closed connection. No-op if absent.
    ///
    /// The user mapping is only released if it still points at this
    /// connection; a newer identify for the same user survives.
    pub fn remove(&self, connection_id: &str) -> Option<Connection> {
        let (removed, total) = {
            let mut state = self.state.write();
            let removed = state.connections.remove(connection_id);
            if let Some(user_id) = removed.as_ref().and_then(|c| c.user_id.as_ref())
                && state.users.get(user_id).map(String::as_str) == Some(connection_id)
            {
                state.users.remove(user_id);
            }
            (removed, state.connections.len())
        };

        if removed.is_some() {
            crate::metrics::set_realtime_connections(total);
            tracing::debug!(connection_id, "connection removed");
        }
        removed
    }

    /// Connection currently registered for a user.
    pub fn lookup(&self, user_id: &str) -> Option<Connection> {
        let state = self.state.read();
        state
            .users
            .get(user_id)
            .and_then(|connection_id| state.connections.get(connection_id))
            .cloned()
    }

    /// Every open connection, identified or not.
    pub fn connections(&self) -> Vec<Connection> {
        self.state.read().connections.values().cloned().collect()
    }

    /// Identified users ordered by connection time, then user ID.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let state = self.state.read();
        let mut rows: Vec<(OffsetDateTime, RegistryEntry)> = state
            .users
            .iter()
            .filter_map(|(user_id, connection_id)| {
                state.connections.get(connection_id).map(|c| {
                    (
                        c.connected_at,
                        RegistryEntry {
                            user_id: user_id.clone(),
                            connection_id: connection_id.clone(),
                            connected_at: format_rfc3339(c.connected_at),
                        },
                    )
                })
            })
            .collect();
        rows.sort_by(|(a_at, a), (b_at, b)| a_at.cmp(b_at).then_with(|| a.user_id.cmp(&b.user_id)));
        rows.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.state.read().connections.len()
    }

    /// Number of users with a registered connection.
    pub fn identified_count(&self) -> usize {
        self.state.read().users.len()
    }
}
