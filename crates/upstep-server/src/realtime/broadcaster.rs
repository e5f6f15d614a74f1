//! Event fan-out to connected clients.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::events::{EventKind, ServerEvent};
use super::registry::{Connection, ConnectionRegistry, OutboundMessage};

/// Outcome of one notify call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Connections a send was attempted on
    pub attempted: usize,
    /// Connections that accepted the message
    pub delivered: usize,
}

impl DeliveryReport {
    pub fn dropped(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// Sends typed notifications to clients. Delivery is fire-and-forget: a
/// missing or failing recipient never surfaces as an error.
pub trait Notifier: Send + Sync {
    /// Deliver to the connection currently registered for `user_id`.
    fn notify_user(&self, user_id: &str, kind: EventKind, payload: Value) -> DeliveryReport;

    /// Deliver to every open connection.
    fn notify_all(&self, kind: EventKind, payload: Value) -> DeliveryReport;
}

/// [`Notifier`] backed by the connection registry.
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    fn deliver<'a>(
        &self,
        event: &ServerEvent,
        recipients: impl IntoIterator<Item = &'a Connection>,
    ) -> DeliveryReport {
        let text = event.to_text();
        let kind = event.kind.as_str();
        let mut report = DeliveryReport::default();

        for connection in recipients {
            report.attempted += 1;
            match connection
                .handle()
                .try_send(OutboundMessage::Text(text.clone()))
            {
                Ok(()) => {
                    report.delivered += 1;
                    crate::metrics::record_notification(kind, "delivered");
                }
                Err(e) => {
                    crate::metrics::record_notification(kind, "dropped");
                    tracing::warn!(
                        connection_id = %connection.id(),
                        user_id = ?connection.user_id,
                        event_type = kind,
                        error = %e,
                        "failed to send event to client"
                    );
                }
            }
        }
        report
    }
}

impl Notifier for EventBroadcaster {
    fn notify_user(&self, user_id: &str, kind: EventKind, payload: Value) -> DeliveryReport {
        let Some(connection) = self.registry.lookup(user_id) else {
            tracing::debug!(user_id, event_type = %kind, "no live connection for user; event dropped");
            return DeliveryReport::default();
        };

        let event = ServerEvent::new(kind, payload);
        let report = self.deliver(&event, [&connection]);
        tracing::debug!(user_id, event_type = %kind, delivered = report.delivered, "notified user");
        report
    }

    fn notify_all(&self, kind: EventKind, payload: Value) -> DeliveryReport {
        let connections = self.registry.connections();
        let event = ServerEvent::new(kind, payload);
        let report = self.deliver(&event, &connections);
        tracing::debug!(
            event_type = %kind,
            recipients = report.attempted,
            delivered = report.delivered,
            "broadcast event to all"
        );
        report
    }
}
