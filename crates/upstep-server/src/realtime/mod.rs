//! Live client connections and server-pushed events.

pub mod broadcaster;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod websocket;

pub use broadcaster::{DeliveryReport, EventBroadcaster, Notifier};
pub use events::{EventKind, ForceLogout, LevelChange, ServerEvent};
pub use registry::{
    Connection, ConnectionHandle, ConnectionRegistry, OutboundMessage, RegistryEntry, SendFailure,
};
pub use websocket::TransportSettings;
