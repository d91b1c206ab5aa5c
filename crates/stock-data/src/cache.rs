//! Read-through cache of merged snapshots keyed by ticker

use crate::models::{StockSnapshot, Ticker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: StockSnapshot,
    inserted_at: Instant,
}

/// Thread-safe snapshot cache with a fixed time-to-live.
///
/// An entry read back at or after `ttl` is treated as absent. A zero TTL
/// turns the cache into a no-op.
pub struct SnapshotCache {
    entries: Arc<RwLock<HashMap<Ticker, CacheEntry>>>,
    ttl: Duration,
}

impl SnapshotCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Get a fresh snapshot for the ticker, if any
    pub async fn get(&self, ticker: &Ticker) -> Option<StockSnapshot> {
        if !self.is_enabled() {
            return None;
        }

        let entries = self.entries.read().await;
        let entry = entries.get(ticker)?;
        if entry.inserted_at.elapsed() < self.ttl {
            tracing::debug!("Cache hit for {}", ticker);
            Some(entry.snapshot.clone())
        } else {
            tracing::debug!("Cache entry for {} expired", ticker);
            None
        }
    }

    /// Store a snapshot, replacing any previous entry for the ticker.
    ///
    /// Expired entries are dropped under the same write lock, so the map
    /// never holds more than the tickers fetched within one TTL.
    pub async fn insert(&self, ticker: Ticker, snapshot: StockSnapshot) {
        if !self.is_enabled() {
            return;
        }

        let mut entries = self.entries.write().await;
        let purged = retain_fresh(&mut entries, self.ttl);
        if purged > 0 {
            tracing::debug!("Purged {} expired cache entries", purged);
        }
        entries.insert(
            ticker,
            CacheEntry {
                snapshot,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Return the cached snapshot or run `fetcher` and cache its success.
    ///
    /// Failures pass through uncached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        ticker: &Ticker,
        fetcher: F,
    ) -> Result<StockSnapshot, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<StockSnapshot, E>>,
    {
        if let Some(snapshot) = self.get(ticker).await {
            return Ok(snapshot);
        }

        tracing::debug!("Cache miss for {}", ticker);

        let snapshot = fetcher().await?;
        self.insert(ticker.clone(), snapshot.clone()).await;

        Ok(snapshot)
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, ticker: &Ticker) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(ticker).is_some()
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        retain_fresh(&mut entries, self.ttl)
    }

    /// Get the number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn retain_fresh(entries: &mut HashMap<Ticker, CacheEntry>, ttl: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    before - entries.len()
}

impl Clone for SnapshotCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FundamentalsSnapshot, PriceSnapshot};
    use tokio_test::{assert_err, assert_ok};

    fn snapshot(ticker: &str, price: f64) -> StockSnapshot {
        let ticker = Ticker::parse(ticker).unwrap();
        StockSnapshot::merge(
            PriceSnapshot {
                ticker,
                price,
                volume: Some(1_000),
                session: None,
                source: "test".to_string(),
            },
            FundamentalsSnapshot::unavailable(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let fpt = Ticker::parse("FPT").unwrap();

        cache.insert(fpt.clone(), snapshot("FPT", 92_500.0)).await;

        let cached = cache.get(&fpt).await.unwrap();
        assert_eq!(cached.price, 92_500.0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache = SnapshotCache::new(Duration::from_millis(20));
        let fpt = Ticker::parse("FPT").unwrap();

        cache.insert(fpt.clone(), snapshot("FPT", 92_500.0)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get(&fpt).await.is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_drops_expired_entries() {
        let cache = SnapshotCache::new(Duration::from_millis(20));

        for ticker in ["AAA", "BBB", "CCC", "DDD"] {
            cache
                .insert(Ticker::parse(ticker).unwrap(), snapshot(ticker, 1.0))
                .await;
        }
        assert_eq!(cache.len().await, 4);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let eee = Ticker::parse("EEE").unwrap();
        cache.insert(eee.clone(), snapshot("EEE", 2.0)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&eee).await.unwrap().price, 2.0);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let cache = SnapshotCache::new(Duration::ZERO);
        let fpt = Ticker::parse("FPT").unwrap();

        cache.insert(fpt.clone(), snapshot("FPT", 92_500.0)).await;

        assert!(!cache.is_enabled());
        assert!(cache.get(&fpt).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_success_only() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let vnm = Ticker::parse("VNM").unwrap();

        let failed: Result<StockSnapshot, String> = cache
            .get_or_fetch(&vnm, || async { Err("upstream down".to_string()) })
            .await;
        assert_err!(failed);
        assert!(cache.is_empty().await);

        let fetched: Result<StockSnapshot, String> = cache
            .get_or_fetch(&vnm, || async { Ok(snapshot("VNM", 61_000.0)) })
            .await;
        assert_ok!(fetched);

        let again: Result<StockSnapshot, String> = cache
            .get_or_fetch(&vnm, || async { Ok(snapshot("VNM", 1.0)) })
            .await;
        assert_eq!(again.unwrap().price, 61_000.0);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let fpt = Ticker::parse("FPT").unwrap();
        let vnm = Ticker::parse("VNM").unwrap();

        cache.insert(fpt.clone(), snapshot("FPT", 1.0)).await;
        cache.insert(vnm.clone(), snapshot("VNM", 2.0)).await;

        assert!(cache.invalidate(&fpt).await);
        assert!(!cache.invalidate(&fpt).await);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
