//! Prometheus metrics for the Upstep server.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Listing cache metrics (hits, misses, stale serves, upstream failures)
//! - Realtime metrics (open connections, notification outcomes)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Listing cache metrics
    pub const LISTING_CACHE_HITS_TOTAL: &str = "listing_cache_hits_total";
    pub const LISTING_CACHE_MISSES_TOTAL: &str = "listing_cache_misses_total";
    pub const LISTING_CACHE_STALE_SERVED_TOTAL: &str = "listing_cache_stale_served_total";
    pub const LISTING_UPSTREAM_FAILURES_TOTAL: &str = "listing_upstream_failures_total";
    pub const LISTING_CACHE_ENTRIES: &str = "listing_cache_entries";

    // Realtime metrics
    pub const REALTIME_CONNECTIONS: &str = "realtime_connections";
    pub const REALTIME_NOTIFICATIONS_TOTAL: &str = "realtime_notifications_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics renders the handle
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let normalized_path = normalize_path(path);

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => normalized_path
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Listing Cache Metrics
// =============================================================================

pub fn record_listing_hit() {
    counter!(names::LISTING_CACHE_HITS_TOTAL).increment(1);
}

pub fn record_listing_miss() {
    counter!(names::LISTING_CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_listing_stale_served() {
    counter!(names::LISTING_CACHE_STALE_SERVED_TOTAL).increment(1);
}

/// Record a failed upstream fetch; `reason` is `timeout`, `status`, `transport` or `malformed`.
pub fn record_upstream_failure(reason: &'static str) {
    counter!(names::LISTING_UPSTREAM_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn set_listing_entries(count: usize) {
    gauge!(names::LISTING_CACHE_ENTRIES).set(count as f64);
}

// =============================================================================
// Realtime Metrics
// =============================================================================

pub fn set_realtime_connections(count: usize) {
    gauge!(names::REALTIME_CONNECTIONS).set(count as f64);
}

/// Record one notification send attempt; `outcome` is `delivered` or `dropped`.
pub fn record_notification(kind: &'static str, outcome: &'static str) {
    counter!(
        names::REALTIME_NOTIFICATIONS_TOTAL,
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

// =============================================================================
// Helpers
// =============================================================================

/// Normalize a path to reduce cardinality.
///
/// /api/coaches/{id} and /api/files/{key} collapse to a placeholder; the
/// fixed sub-routes under them keep their names.
fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let mut normalized: Vec<String> = Vec::with_capacity(parts.len());

    for part in parts {
        let prev = normalized.last().map(|s| s.as_str()).unwrap_or("");
        let replacement = match prev {
            "coaches" if !matches!(part, "" | "login" | "status") => Some("{id}"),
            "files" if !matches!(part, "" | "prefetch" | "cache") => Some("{key}"),
            "cache" if !matches!(part, "" | "stats") => Some("{key}"),
            "test" if !part.is_empty() => Some("{user_id}"),
            _ => None,
        };
        normalized.push(replacement.map(str::to_string).unwrap_or_else(|| part.to_string()));
    }

    normalized.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/coaches/550e8400-e29b-41d4-a716-446655440000"),
            "/api/coaches/{id}"
        );
        assert_eq!(
            normalize_path("/api/coaches/abc/status"),
            "/api/coaches/{id}/status"
        );
        assert_eq!(normalize_path("/api/coaches/login"), "/api/coaches/login");
        assert_eq!(normalize_path("/api/files/beginner"), "/api/files/{key}");
        assert_eq!(normalize_path("/api/files/prefetch"), "/api/files/prefetch");
        assert_eq!(
            normalize_path("/api/files/cache/senior"),
            "/api/files/cache/{key}"
        );
        assert_eq!(normalize_path("/api/files/cache/stats"), "/api/files/cache/stats");
        assert_eq!(normalize_path("/healthz"), "/healthz");
    }
}
