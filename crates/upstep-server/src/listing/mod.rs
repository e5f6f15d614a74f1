//! Training-file listings: upstream source, resilient cache and prefetch.

pub mod cache;
pub mod handlers;
pub mod ordering;
pub mod prefetch;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStats, Freshness, Listing, ListingCache, ListingError};
pub use prefetch::Prefetcher;
pub use source::{HttpListingSource, ListingSource, UpstreamError};
