//! Background cache warming.

use std::sync::Arc;

use upstep_core::ListingKey;

use super::cache::ListingCache;

/// Warms the listing cache off the request path.
#[derive(Clone)]
pub struct Prefetcher {
    cache: Arc<ListingCache>,
    limit: usize,
}

impl Prefetcher {
    pub fn new(cache: Arc<ListingCache>, limit: usize) -> Self {
        Self { cache, limit }
    }

    /// Spawn a fetch for each of the first `limit` keys that is not already
    /// cached, and return the accepted keys without waiting.
    ///
    /// Must be called within a tokio runtime.
    pub fn prefetch(&self, keys: &[String]) -> Vec<String> {
        let accepted: Vec<String> = keys.iter().take(self.limit).cloned().collect();

        for key in &accepted {
            if let Err(e) = ListingKey::parse(key.as_str()) {
                tracing::warn!(key = %key, error = %e, "prefetch skipped invalid key");
                continue;
            }
            if self.cache.is_resident(key) {
                continue;
            }

            let cache = Arc::clone(&self.cache);
            let key = key.clone();
            tokio::spawn(async move {
                match cache.get_listing(&key).await {
                    Ok(listing) => {
                        tracing::debug!(key = %key, count = listing.items.len(), "prefetched listing");
                    }
                    Err(e) => tracing::warn!(key = %key, error = %e, "prefetch failed"),
                }
            });
        }

        if keys.len() > accepted.len() {
            tracing::debug!(
                requested = keys.len(),
                accepted = accepted.len(),
                "prefetch request truncated"
            );
        }
        accepted
    }
}
