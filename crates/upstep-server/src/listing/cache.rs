//! Resilient listing cache.
//!
//! ## Read path
//!
//! 1. A fresh entry (younger than the TTL) is returned without touching
//!    the upstream.
//! 2. Otherwise the caller takes the per-key in-flight lock, so only one
//!    upstream fetch per key runs at a time. Waiters re-check freshness
//!    once they get the lock and usually find the entry the leader stored.
//! 3. The fetch races a timer. If the timer wins, the fetch future is
//!    dropped.
//! 4. On failure any existing entry, however old, is served as stale.
//!    Only a cold key with a failed fetch is an error.
//!
//! Entries are never evicted for age alone. `clear`/`clear_all` remove
//! them on operator request, and [`ListingCache::prune_idle`] drops entries
//! nobody has read for a long time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use upstep_core::{CoreError, FileInfo, ListingKey};

use super::ordering::canonical_order;
use super::source::{ListingSource, UpstreamError};
use crate::admin::OperatorToken;
use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error(transparent)]
    InvalidKey(#[from] CoreError),
    /// Fetch failed and nothing was cached for the key
    #[error("listing unavailable: {0}")]
    Unavailable(#[source] UpstreamError),
}

impl From<ListingError> for ApiError {
    fn from(e: ListingError) -> Self {
        match e {
            ListingError::InvalidKey(err) => err.into(),
            ListingError::Unavailable(UpstreamError::Timeout(d)) => {
                ApiError::UpstreamTimeout(format!("no response within {d:?}"))
            }
            ListingError::Unavailable(err) => ApiError::UpstreamUnavailable(err.to_string()),
        }
    }
}

/// Whether a listing came from within the TTL window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale)
    }
}

/// A listing as returned to callers.
#[derive(Debug, Clone)]
pub struct Listing {
    pub key: ListingKey,
    pub items: Arc<Vec<FileInfo>>,
    pub freshness: Freshness,
    pub cached_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct CachedListing {
    items: Arc<Vec<FileInfo>>,
    stored_at: Instant,
    cached_at: OffsetDateTime,
    last_read: Instant,
}

impl CachedListing {
    fn new(items: Vec<FileInfo>) -> Self {
        let now = Instant::now();
        Self {
            items: Arc::new(items),
            stored_at: now,
            cached_at: OffsetDateTime::now_utc(),
            last_read: now,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }

    fn read(&mut self, key: &ListingKey, freshness: Freshness) -> Listing {
        self.last_read = Instant::now();
        Listing {
            key: key.clone(),
            items: Arc::clone(&self.items),
            freshness,
            cached_at: self.cached_at,
        }
    }
}

/// Counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
    pub upstream_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
    upstream_failures: AtomicU64,
}

type InFlightMap = DashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Removes a key's fetch lock from the map, on completion or cancellation,
/// once no other caller holds it.
struct InFlightSlot<'a> {
    map: &'a InFlightMap,
    key: &'a str,
}

impl<'a> InFlightSlot<'a> {
    fn new(map: &'a InFlightMap, key: &'a str) -> Self {
        Self { map, key }
    }

    fn lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.map
            .entry(self.key.to_string())
            .or_default()
            .value()
            .clone()
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.map
            .remove_if(self.key, |_, l| Arc::strong_count(l) == 1);
    }
}

pub struct ListingCache {
    entries: DashMap<String, CachedListing>,
    in_flight: InFlightMap,
    source: Arc<dyn ListingSource>,
    ttl: Duration,
    fetch_timeout: Duration,
    counters: Counters,
}

impl ListingCache {
    pub fn new(source: Arc<dyn ListingSource>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            source,
            ttl,
            fetch_timeout,
            counters: Counters::default(),
        }
    }

    /// Return the listing for `key`, fetching it if needed.
    pub async fn get_listing(&self, key: &str) -> Result<Listing, ListingError> {
        let key = ListingKey::parse(key)?;

        if let Some(listing) = self.read_fresh(&key) {
            return Ok(listing);
        }

        let slot = InFlightSlot::new(&self.in_flight, key.as_str());
        // Declared after `slot` so both are released before the slot drops
        let lock = slot.lock();
        let _guard = lock.lock().await;
        match self.read_fresh(&key) {
            Some(listing) => Ok(listing),
            None => self.refresh(&key).await,
        }
    }

    fn read_fresh(&self, key: &ListingKey) -> Option<Listing> {
        let mut entry = self.entries.get_mut(key.as_str())?;
        if !entry.is_fresh(self.ttl) {
            return None;
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_listing_hit();
        Some(entry.read(key, Freshness::Fresh))
    }

    async fn refresh(&self, key: &ListingKey) -> Result<Listing, ListingError> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_listing_miss();

        let outcome = tokio::select! {
            fetched = self.source.fetch(key) => fetched,
            _ = tokio::time::sleep(self.fetch_timeout) => Err(UpstreamError::Timeout(self.fetch_timeout)),
        };

        match outcome {
            Ok(items) => {
                let mut entry = CachedListing::new(canonical_order(items));
                let listing = entry.read(key, Freshness::Fresh);
                self.entries.insert(key.to_string(), entry);
                crate::metrics::set_listing_entries(self.entries.len());
                tracing::debug!(key = %key, count = listing.items.len(), "listing refreshed");
                Ok(listing)
            }
            Err(e) => {
                self.counters
                    .upstream_failures
                    .fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_upstream_failure(e.reason());

                match self.entries.get_mut(key.as_str()) {
                    Some(mut entry) => {
                        tracing::warn!(key = %key, error = %e, "upstream failed; serving stale listing");
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        crate::metrics::record_listing_stale_served();
                        Ok(entry.read(key, Freshness::Stale))
                    }
                    None => {
                        tracing::warn!(key = %key, error = %e, "upstream failed and nothing is cached");
                        Err(ListingError::Unavailable(e))
                    }
                }
            }
        }
    }

    /// Whether any entry, fresh or stale, exists for `key`.
    pub fn is_resident(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn clear(&self, _token: &OperatorToken, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        crate::metrics::set_listing_entries(self.entries.len());
        tracing::info!(key, removed, "listing cache entry cleared");
        removed
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear_all(&self, _token: &OperatorToken) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        crate::metrics::set_listing_entries(0);
        tracing::info!(count, "listing cache cleared");
        count
    }

    /// Drop entries not read within `max_idle`. Returns how many were removed.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.last_read.elapsed() < max_idle);
        let pruned = before.saturating_sub(self.entries.len());
        if pruned > 0 {
            crate::metrics::set_listing_entries(self.entries.len());
            tracing::info!(pruned, "pruned idle listing cache entries");
        }
        pruned
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
            upstream_failures: self.counters.upstream_failures.load(Ordering::Relaxed),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::testing::FakeSource;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache(source: &Arc<FakeSource>, ttl: Duration, timeout: Duration) -> ListingCache {
        ListingCache::new(source.clone(), ttl, timeout)
    }

    fn names(listing: &Listing) -> Vec<String> {
        listing.items.iter().map(|f| f.filename.clone()).collect()
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_upstream() {
        let source = Arc::new(FakeSource::new(&["10.pgn", "2.pgn", "beta.pgn", "alpha.pgn"]));
        let cache = cache(&source, HOUR, HOUR);

        let first = cache.get_listing("beginner").await.unwrap();
        let second = cache.get_listing("beginner").await.unwrap();

        assert_eq!(source.started(), 1);
        assert_eq!(first.freshness, Freshness::Fresh);
        assert_eq!(second.freshness, Freshness::Fresh);
        assert_eq!(names(&first), ["2.pgn", "10.pgn", "alpha.pgn", "beta.pgn"]);
        assert_eq!(names(&first), names(&second));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let source = Arc::new(FakeSource::new(&[]));
        let cache = cache(&source, HOUR, HOUR);

        for bad in ["", "../etc", "a-b", "a b"] {
            assert!(matches!(
                cache.get_listing(bad).await,
                Err(ListingError::InvalidKey(_))
            ));
        }
        assert_eq!(source.started(), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_served_stale_on_failure() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]));
        // Zero TTL: every entry is immediately expired
        let cache = cache(&source, Duration::ZERO, HOUR);

        let first = cache.get_listing("senior").await.unwrap();
        assert_eq!(first.freshness, Freshness::Fresh);

        source.set_failing(true);
        let second = cache.get_listing("senior").await.unwrap();
        assert_eq!(second.freshness, Freshness::Stale);
        assert_eq!(names(&second), ["a.pgn"]);
        assert_eq!(source.started(), 2);
        assert_eq!(cache.stats().stale_served, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refreshed_on_success() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]));
        let cache = cache(&source, Duration::ZERO, HOUR);

        cache.get_listing("senior").await.unwrap();
        let again = cache.get_listing("senior").await.unwrap();
        assert_eq!(again.freshness, Freshness::Fresh);
        assert_eq!(source.started(), 2);
    }

    #[tokio::test]
    async fn test_cold_failure_is_unavailable() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]));
        source.set_failing(true);
        let cache = cache(&source, HOUR, HOUR);

        let err = cache.get_listing("master").await.unwrap_err();
        assert!(matches!(
            err,
            ListingError::Unavailable(UpstreamError::Status { status: 503 })
        ));
        assert!(!cache.is_resident("master"));
    }

    #[tokio::test]
    async fn test_timeout_without_entry() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]).with_delay(Duration::from_millis(500)));
        let cache = cache(&source, HOUR, Duration::from_millis(20));

        let err = cache.get_listing("master").await.unwrap_err();
        assert!(matches!(
            err,
            ListingError::Unavailable(UpstreamError::Timeout(_))
        ));
        // The abandoned fetch never finished
        assert_eq!(source.completed(), 0);
    }

    #[tokio::test]
    async fn test_timeout_with_stale_entry() {
        let slow = Arc::new(FakeSource::new(&["a.pgn"]).with_delay(Duration::from_millis(500)));
        let cache = ListingCache::new(slow.clone(), Duration::ZERO, Duration::from_millis(20));
        cache
            .entries
            .insert("master".into(), CachedListing::new(vec![FileInfo::new("u", "old.pgn")]));

        let listing = cache.get_listing("master").await.unwrap();
        assert_eq!(listing.freshness, Freshness::Stale);
        assert_eq!(names(&listing), ["old.pgn"]);
    }

    #[tokio::test]
    async fn test_concurrent_cold_requests_fetch_once() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]).with_delay(Duration::from_millis(50)));
        let cache = Arc::new(cache(&source, HOUR, HOUR));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_listing("beginner").await })
            })
            .collect();

        for task in futures_util::future::join_all(tasks).await {
            let listing = task.unwrap().unwrap();
            assert_eq!(listing.freshness, Freshness::Fresh);
        }
        assert_eq!(source.started(), 1);
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_requests_release_fetch_lock() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]).with_delay(Duration::from_secs(5)));
        let cache = Arc::new(cache(&source, HOUR, HOUR));

        let tasks: Vec<_> = (0..3)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_listing(&format!("key_{i}")).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.started(), 3);

        for task in tasks {
            task.abort();
            assert!(task.await.unwrap_err().is_cancelled());
        }
        assert!(cache.in_flight.is_empty());
        assert_eq!(source.completed(), 0);
    }

    #[tokio::test]
    async fn test_clear_and_clear_all() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]));
        let cache = cache(&source, HOUR, HOUR);
        let token = OperatorToken::for_tests();

        cache.get_listing("beginner").await.unwrap();
        cache.get_listing("senior").await.unwrap();
        assert_eq!(source.started(), 2);

        assert!(cache.clear(&token, "beginner"));
        assert!(!cache.is_resident("beginner"));
        assert!(cache.is_resident("senior"));
        assert!(!cache.clear(&token, "beginner"));

        // Cleared key goes back upstream
        cache.get_listing("beginner").await.unwrap();
        assert_eq!(source.started(), 3);

        assert_eq!(cache.clear_all(&token), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_prune_idle() {
        let source = Arc::new(FakeSource::new(&["a.pgn"]));
        let cache = cache(&source, HOUR, HOUR);

        cache.get_listing("beginner").await.unwrap();
        assert_eq!(cache.prune_idle(HOUR), 0);
        assert!(cache.is_resident("beginner"));

        assert_eq!(cache.prune_idle(Duration::ZERO), 1);
        assert!(!cache.is_resident("beginner"));
    }
}
