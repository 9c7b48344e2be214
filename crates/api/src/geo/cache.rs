//! Time-bounded memo of geo lookups.
//!
//! Entries are created lazily, overwritten in place on refresh, and never
//! evicted: staleness is decided at read time against the TTL. The cache is
//! an optimisation only, never a source of truth.

use std::collections::HashMap;

use bazaar_core::types::Timestamp;
use tokio::sync::RwLock;

use super::GeoLocation;

/// One memoized lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCacheEntry {
    pub ip: String,
    pub location: GeoLocation,
    pub cached_at: Timestamp,
}

/// Map-wide reader/writer-locked cache keyed by IP.
pub struct GeoCache {
    entries: RwLock<HashMap<String, GeoCacheEntry>>,
    ttl: chrono::Duration,
}

impl GeoCache {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Return the entry for `ip` if it was cached less than one TTL before `now`.
    pub async fn get_fresh(&self, ip: &str, now: Timestamp) -> Option<GeoCacheEntry> {
        let entries = self.entries.read().await;
        entries
            .get(ip)
            .filter(|entry| now - entry.cached_at < self.ttl)
            .cloned()
    }

    /// Insert or overwrite the entry for `ip`, stamped with `now`.
    pub async fn insert(&self, ip: &str, location: GeoLocation, now: Timestamp) {
        let entry = GeoCacheEntry {
            ip: ip.to_string(),
            location,
            cached_at: now,
        };
        self.entries.write().await.insert(ip.to_string(), entry);
    }

    /// Number of entries, fresh or stale.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn berlin() -> GeoLocation {
        GeoLocation {
            city: "Berlin".into(),
            country: "Germany".into(),
            latitude: 52.52,
            longitude: 13.405,
        }
    }

    #[tokio::test]
    async fn entry_is_fresh_until_the_ttl_elapses() {
        let cache = GeoCache::new(Duration::minutes(10));
        let t0 = Utc::now();
        cache.insert("1.2.3.4", berlin(), t0).await;

        assert!(cache.get_fresh("1.2.3.4", t0).await.is_some());
        assert!(cache
            .get_fresh("1.2.3.4", t0 + Duration::minutes(10) - Duration::seconds(1))
            .await
            .is_some());
        assert!(cache
            .get_fresh("1.2.3.4", t0 + Duration::minutes(10))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn stale_entries_are_kept_until_overwritten() {
        let cache = GeoCache::new(Duration::minutes(10));
        let t0 = Utc::now();
        cache.insert("1.2.3.4", berlin(), t0).await;

        let later = t0 + Duration::hours(1);
        assert!(cache.get_fresh("1.2.3.4", later).await.is_none());
        assert_eq!(cache.len().await, 1);

        let mut paris = berlin();
        paris.city = "Paris".into();
        cache.insert("1.2.3.4", paris, later).await;

        let entry = cache.get_fresh("1.2.3.4", later).await.unwrap();
        assert_eq!(entry.location.city, "Paris");
        assert_eq!(entry.cached_at, later);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_ip_misses() {
        let cache = GeoCache::new(Duration::minutes(10));
        assert!(cache.is_empty().await);
        assert!(cache.get_fresh("9.9.9.9", Utc::now()).await.is_none());
    }
}
