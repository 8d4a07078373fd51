//! Time-windowed memoization of directory lookups.
//!
//! Entries expire lazily: `get` ignores anything older than its TTL and the
//! next `put` for the key overwrites it. Nothing is swept in the background,
//! so the map grows with the number of distinct queries in a session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use airwaves_proto::config::CacheConfig;
use airwaves_proto::protocol::{Country, Station, Tag};
use tokio::sync::RwLock;
use tracing::debug;

/// How long an entry stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Country and tag listings (1 hour by default).
    Listing,
    /// Free-text search (10 minutes by default).
    Search,
}

/// Cached payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Countries(Vec<Country>),
    Tags(Vec<Tag>),
    Stations(Vec<Station>),
}

/// Logical query key. Identical queries from different views share a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn countries() -> Self {
        Self("countries".to_string())
    }

    pub fn tags(limit: usize) -> Self {
        Self(format!("tags_{}", limit))
    }

    pub fn country(code: &str) -> Self {
        Self(format!("country_{}", code.trim().to_uppercase()))
    }

    pub fn tag(name: &str) -> Self {
        Self(format!("tag_{}", name.trim().to_lowercase()))
    }

    pub fn search(query: &str) -> Self {
        Self(format!("search_{}", query.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Arc<Listing>,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    listing_ttl: Duration,
    search_ttl: Duration,
}

impl ResultCache {
    pub fn new(listing_ttl: Duration, search_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            listing_ttl,
            search_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.listing_ttl(), config.search_ttl())
    }

    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Listing => self.listing_ttl,
            TtlClass::Search => self.search_ttl,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Listing>> {
        self.get_at(key, Instant::now()).await
    }

    /// Lookup as of `now`. Expired entries read as absent.
    pub async fn get_at(&self, key: &CacheKey, now: Instant) -> Option<Arc<Listing>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_valid_at(now) {
            debug!("cache: hit {}", key.as_str());
            Some(Arc::clone(&entry.data))
        } else {
            debug!("cache: expired {}", key.as_str());
            None
        }
    }

    pub async fn put(&self, key: CacheKey, data: Listing, class: TtlClass) -> Arc<Listing> {
        self.put_at(key, data, class, Instant::now()).await
    }

    /// Store `data` as fetched at `fetched_at`, replacing any previous entry.
    pub async fn put_at(
        &self,
        key: CacheKey,
        data: Listing,
        class: TtlClass,
        fetched_at: Instant,
    ) -> Arc<Listing> {
        let data = Arc::new(data);
        let entry = CacheEntry {
            key: key.clone(),
            data: Arc::clone(&data),
            fetched_at,
            ttl: self.ttl_for(class),
        };
        self.entries.write().await.insert(key, entry);
        data
    }

    /// Number of slots held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations(names: &[&str]) -> Listing {
        Listing::Stations(
            names
                .iter()
                .map(|n| Station {
                    id: n.to_string(),
                    name: n.to_string(),
                    url: format!("https://{}.example/live", n),
                    ..Station::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_keys_normalise_query() {
        assert_eq!(CacheKey::country("de "), CacheKey::country("DE"));
        assert_eq!(CacheKey::tag(" Jazz"), CacheKey::tag("jazz"));
        assert_eq!(CacheKey::search("Rock"), CacheKey::search("rock"));
        assert_eq!(CacheKey::country("DE").as_str(), "country_DE");
        assert_ne!(CacheKey::tag("jazz"), CacheKey::search("jazz"));
    }

    #[tokio::test]
    async fn test_read_within_ttl_returns_same_object() {
        let cache = ResultCache::new(Duration::from_secs(3600), Duration::from_secs(600));
        let t0 = Instant::now();
        let stored = cache
            .put_at(CacheKey::tag("jazz"), stations(&["a", "b"]), TtlClass::Listing, t0)
            .await;

        let hit = cache
            .get_at(&CacheKey::tag("jazz"), t0 + Duration::from_secs(3599))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_absent_then_is_replaced() {
        let cache = ResultCache::new(Duration::from_secs(3600), Duration::from_secs(600));
        let t0 = Instant::now();
        let key = CacheKey::search("rock");
        cache
            .put_at(key.clone(), stations(&["old"]), TtlClass::Search, t0)
            .await;

        let later = t0 + Duration::from_secs(600);
        assert!(cache.get_at(&key, later).await.is_none());

        let fresh = cache
            .put_at(key.clone(), stations(&["new"]), TtlClass::Search, later)
            .await;
        let hit = cache.get_at(&key, later).await.unwrap();
        assert!(Arc::ptr_eq(&fresh, &hit));
        assert_eq!(*hit, stations(&["new"]));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_ttl_classes_differ() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        cache
            .put_at(CacheKey::country("FR"), stations(&["fip"]), TtlClass::Listing, t0)
            .await;
        cache
            .put_at(CacheKey::search("fip"), stations(&["fip"]), TtlClass::Search, t0)
            .await;

        let at = t0 + Duration::from_secs(11 * 60);
        assert!(cache.get_at(&CacheKey::country("FR"), at).await.is_some());
        assert!(cache.get_at(&CacheKey::search("fip"), at).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_serves() {
        let cache = ResultCache::new(Duration::ZERO, Duration::ZERO);
        let t0 = Instant::now();
        cache
            .put_at(CacheKey::countries(), Listing::Countries(vec![]), TtlClass::Listing, t0)
            .await;
        assert!(cache.get_at(&CacheKey::countries(), t0).await.is_none());
    }
}
