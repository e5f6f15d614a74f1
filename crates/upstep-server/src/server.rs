use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post},
};
use tokio::task::JoinHandle;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use upstep_db_memory::InMemoryAccountStore;
use upstep_storage::AccountStore;

use crate::accounts::{self, StatusCoordinator};
use crate::admin::{ADMIN_KEY_HEADER, AdminSecret};
use crate::config::{AppConfig, CorsConfig};
use crate::listing::{self, HttpListingSource, ListingCache, ListingSource, Prefetcher};
use crate::realtime::{self, ConnectionRegistry, EventBroadcaster, Notifier};
use crate::{handlers, middleware as app_middleware};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AccountStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub coordinator: Arc<StatusCoordinator>,
    pub listings: Arc<ListingCache>,
    pub prefetcher: Prefetcher,
    pub admin: Arc<AdminSecret>,
}

impl AppState {
    /// Wire the components together.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AccountStore>,
        source: Arc<dyn ListingSource>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let notifier: Arc<dyn Notifier> = Arc::new(EventBroadcaster::new(registry.clone()));
        let coordinator = Arc::new(StatusCoordinator::new(store.clone(), notifier.clone()));
        let listings = Arc::new(ListingCache::new(
            source,
            config.listing.ttl(),
            config.listing.fetch_timeout(),
        ));
        let prefetcher = Prefetcher::new(listings.clone(), config.listing.prefetch_limit);
        let admin = Arc::new(AdminSecret::new(config.admin.api_key.clone()));
        if !admin.is_configured() {
            tracing::warn!("admin.api_key is not set; admin endpoints will reject every request");
        }

        Self {
            config: Arc::new(config),
            store,
            registry,
            notifier,
            coordinator,
            listings,
            prefetcher,
            admin,
        }
    }
}

impl FromRef<AppState> for Arc<AdminSecret> {
    fn from_ref(state: &AppState) -> Self {
        state.admin.clone()
    }
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    if cfg.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ADMIN_KEY_HEADER),
        ])
        .allow_credentials(true)
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let cors = cors_layer(&state.config.cors);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        // Accounts
        .route(
            "/api/coaches",
            get(accounts::handlers::list_accounts).post(accounts::handlers::create_account),
        )
        .route("/api/coaches/login", post(accounts::handlers::login))
        .route(
            "/api/coaches/status",
            patch(accounts::handlers::change_status_bulk),
        )
        .route(
            "/api/coaches/{id}",
            get(accounts::handlers::get_account)
                .put(accounts::handlers::update_account)
                .delete(accounts::handlers::delete_account),
        )
        .route(
            "/api/coaches/{id}/status",
            patch(accounts::handlers::change_status),
        )
        // File listings
        .route("/api/files/prefetch", post(listing::handlers::prefetch))
        .route("/api/files/cache", delete(listing::handlers::clear_all))
        .route("/api/files/cache/stats", get(listing::handlers::cache_stats))
        .route("/api/files/cache/{key}", delete(listing::handlers::clear_key))
        .route("/api/files/{key}", get(listing::handlers::get_listing))
        // Realtime
        .route(
            "/api/realtime/connections",
            get(realtime::handlers::list_connections),
        )
        .route("/api/realtime/test", post(realtime::handlers::test_notify_all))
        .route(
            "/api/realtime/test/{user_id}",
            post(realtime::handlers::test_notify_user),
        )
        .route("/ws", get(realtime::handlers::ws_upgrade))
        // Middleware stack, innermost first; request id wraps the trace span
        .layer(middleware::from_fn(app_middleware::http_metrics))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .extensions()
                        .get::<HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Periodically drop listing entries nobody has read for a while.
pub fn spawn_housekeeping(state: &AppState) -> JoinHandle<()> {
    let listings = state.listings.clone();
    let period = state.config.listing.prune_interval();
    let max_idle = state
        .config
        .listing
        .ttl()
        .saturating_mul(state.config.listing.prune_after_ttl_multiple);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            listings.prune_idle(max_idle);
        }
    })
}

pub struct UpstepServer {
    addr: SocketAddr,
    state: AppState,
    app: Router,
}

#[derive(Default)]
pub struct ServerBuilder {
    config: AppConfig,
    addr: Option<SocketAddr>,
    store: Option<Arc<dyn AccountStore>>,
    source: Option<Arc<dyn ListingSource>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_listing_source(mut self, source: Arc<dyn ListingSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the server. Unset collaborators default to the in-memory store
    /// and the HTTP listing source from `[upstream]`.
    pub fn build(self) -> anyhow::Result<UpstepServer> {
        let addr = self.addr.unwrap_or_else(|| self.config.addr());
        let store: Arc<dyn AccountStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryAccountStore::new()),
        };
        let source: Arc<dyn ListingSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpListingSource::new(&self.config.upstream)?),
        };

        let state = AppState::new(self.config, store, source);
        let app = build_app(state.clone());
        Ok(UpstepServer { addr, state, app })
    }
}

impl UpstepServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);

        let housekeeping = spawn_housekeeping(&self.state);
        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        housekeeping.abort();

        result?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
