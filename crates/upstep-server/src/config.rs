use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Operator credential for cache administration and test triggers
    #[serde(default)]
    pub admin: AdminConfig,
    /// WebSocket transport settings
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Training-file listing cache
    #[serde(default)]
    pub listing: ListingConfig,
    /// Remote object store serving file listings
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Realtime validations
        if self.realtime.channel_capacity == 0 {
            return Err("realtime.channel_capacity must be > 0".into());
        }
        if self.realtime.heartbeat_secs == 0 {
            return Err("realtime.heartbeat_secs must be > 0".into());
        }
        // Listing validations
        if self.listing.fetch_timeout_ms == 0 {
            return Err("listing.fetch_timeout_ms must be > 0".into());
        }
        if self.listing.prefetch_limit == 0 {
            return Err("listing.prefetch_limit must be > 0".into());
        }
        if self.listing.prune_interval_secs == 0 {
            return Err("listing.prune_interval_secs must be > 0".into());
        }
        if self.listing.prune_after_ttl_multiple == 0 {
            return Err("listing.prune_after_ttl_multiple must be > 0".into());
        }
        // Upstream validation
        if self.upstream.base_url.trim().is_empty() {
            return Err("upstream.base_url must not be empty".into());
        }
        if let Some(key) = self.admin.api_key.as_deref()
            && key.is_empty()
        {
            return Err("admin.api_key must not be empty when set".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Browser origins allowed to call the API.
/// An empty list allows any origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://admin-pannel-swart.vercel.app".into(),
        "https://upstep-academy-teaching-platform.vercel.app".into(),
    ]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Admin credential configuration
///
/// The key can be supplied via UPSTEP__ADMIN__API_KEY. With no key set,
/// every admin endpoint answers 401.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound queue depth per connection; sends to a full queue are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Interval between server pings
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_channel_capacity() -> usize {
    64
}
fn default_heartbeat_secs() -> u64 {
    30
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl RealtimeConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// Listing cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Freshness window in seconds
    #[serde(default = "default_listing_ttl_secs")]
    pub ttl_secs: u64,

    /// Upper bound on one upstream fetch
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Keys accepted per prefetch call
    #[serde(default = "default_prefetch_limit")]
    pub prefetch_limit: usize,

    /// Housekeeping interval
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,

    /// Entries unread for this many TTLs are pruned
    #[serde(default = "default_prune_after_ttl_multiple")]
    pub prune_after_ttl_multiple: u32,
}

fn default_listing_ttl_secs() -> u64 {
    12 * 60 * 60 // 12 hours
}
fn default_fetch_timeout_ms() -> u64 {
    8_000
}
fn default_prefetch_limit() -> usize {
    5
}
fn default_prune_interval_secs() -> u64 {
    3600
}
fn default_prune_after_ttl_multiple() -> u32 {
    4
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_listing_ttl_secs(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            prefetch_limit: default_prefetch_limit(),
            prune_interval_secs: default_prune_interval_secs(),
            prune_after_ttl_multiple: default_prune_after_ttl_multiple(),
        }
    }
}

impl ListingConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

/// Remote object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Listing endpoint; `GET {base_url}/{key}` returns the folder contents
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,

    /// Prefix for download URLs when the listing omits them
    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default = "default_upstream_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_upstream_base_url() -> String {
    "http://127.0.0.1:9000/listings".into()
}
fn default_upstream_connect_timeout_ms() -> u64 {
    2_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            public_base_url: None,
            connect_timeout_ms: default_upstream_connect_timeout_ms(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("upstep.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., UPSTEP__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("UPSTEP")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}
