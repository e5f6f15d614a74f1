pub mod accounts;
pub mod admin;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod listing;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod realtime;
pub mod server;

pub use accounts::{StatusCoordinator, StatusTransition};
pub use admin::{AdminSecret, OperatorToken};
pub use config::{AppConfig, ListingConfig, RealtimeConfig, ServerConfig, UpstreamConfig};
pub use error::ApiError;
pub use extract::ApiJson;
pub use listing::{Freshness, HttpListingSource, ListingCache, ListingSource, Prefetcher};
pub use observability::init_tracing;
pub use realtime::{ConnectionRegistry, EventBroadcaster, EventKind, Notifier};
pub use server::{AppState, ServerBuilder, UpstepServer, build_app, spawn_housekeeping};
