//! Cache-fronted geo resolution.

use std::sync::Arc;

use bazaar_core::types::Timestamp;
use chrono::Utc;

use super::{routable_ip, GeoCache, GeoError, GeoLocation, GeoLookup};

/// Resolves caller IPs to locations, memoizing results for one TTL.
///
/// Constructed once at startup and shared via `Arc` by the session
/// managers; the cache lives and dies with the resolver.
pub struct GeoResolver {
    cache: GeoCache,
    lookup: Arc<dyn GeoLookup>,
}

impl GeoResolver {
    pub fn new(lookup: Arc<dyn GeoLookup>, ttl: chrono::Duration) -> Self {
        Self {
            cache: GeoCache::new(ttl),
            lookup,
        }
    }

    pub fn cache(&self) -> &GeoCache {
        &self.cache
    }

    /// Resolve `ip` as of now.
    pub async fn resolve(&self, ip: &str) -> Result<GeoLocation, GeoError> {
        self.resolve_at(ip, Utc::now()).await
    }

    /// Resolve `ip` as of `now`.
    ///
    /// A fresh cache entry is returned under the read lock. On a miss or a
    /// stale entry the external lookup runs with no lock held, and only a
    /// successful result is written back. Concurrent misses for the same IP
    /// may both reach the lookup service; the last writer wins.
    pub async fn resolve_at(&self, ip: &str, now: Timestamp) -> Result<GeoLocation, GeoError> {
        routable_ip(ip)?;

        if let Some(entry) = self.cache.get_fresh(ip, now).await {
            tracing::trace!(ip, "Geo cache hit");
            return Ok(entry.location);
        }

        let location = self.lookup.lookup(ip).await?;
        self.cache.insert(ip, location.clone(), now).await;
        tracing::debug!(ip, city = %location.city, "Geo lookup cached");
        Ok(location)
    }
}
