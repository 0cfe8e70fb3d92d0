// src/services/market_data.rs
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{PriceSeries, Window};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("market data provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode market data response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("market data provider error: {0}")]
    Provider(String),
}

/// Source of daily price history.
///
/// An unknown or delisted symbol is an empty series, not an error.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn history(&self, ticker: &str, window: Window) -> Result<PriceSeries, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Entries live for the whole process.
    #[default]
    Never,
    /// Entries older than the duration are treated as missing.
    ExpireAfter(Duration),
}

type CacheKey = (String, Window);

#[derive(Debug)]
struct CacheEntry {
    series: PriceSeries,
    stored_at: Instant,
}

/// Process-lifetime memo of fetched series keyed by (ticker, window).
#[derive(Debug, Default)]
pub struct SeriesCache {
    policy: EvictionPolicy,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl SeriesCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        SeriesCache {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    fn drop_expired(&self, entries: &mut HashMap<CacheKey, CacheEntry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));
        before - entries.len()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        match self.policy {
            EvictionPolicy::Never => true,
            EvictionPolicy::ExpireAfter(ttl) => now.duration_since(entry.stored_at) < ttl,
        }
    }

    pub async fn get(&self, ticker: &str, window: Window) -> Option<PriceSeries> {
        let entries = self.entries.lock().await;
        let entry = entries.get(&(ticker.to_string(), window))?;
        if self.is_fresh(entry, Instant::now()) {
            Some(entry.series.clone())
        } else {
            None
        }
    }

    /// Stores a series. Under a TTL, stale entries are swept first so the map
    /// only holds live keys.
    pub async fn insert(&self, ticker: &str, window: Window, series: PriceSeries) {
        let mut entries = self.entries.lock().await;
        if let EvictionPolicy::ExpireAfter(_) = self.policy {
            let removed = self.drop_expired(&mut entries, Instant::now());
            if removed > 0 {
                debug!("Evicted {} expired series", removed);
            }
        }
        entries.insert(
            (ticker.to_string(), window),
            CacheEntry {
                series,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.drop_expired(&mut entries, Instant::now())
    }
}

/// Memoizing front for a [`QuoteProvider`].
pub struct MarketDataFetcher {
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<SeriesCache>,
    remote_calls: AtomicU64,
}

impl MarketDataFetcher {
    pub fn new(provider: Arc<dyn QuoteProvider>, cache: Arc<SeriesCache>) -> Self {
        MarketDataFetcher {
            provider,
            cache,
            remote_calls: AtomicU64::new(0),
        }
    }

    /// Returns the cached series for the pair, or asks the provider once and
    /// remembers the answer. Provider errors are returned as-is and not cached.
    pub async fn fetch(&self, ticker: &str, window: Window) -> Result<PriceSeries, FetchError> {
        if let Some(series) = self.cache.get(ticker, window).await {
            debug!("Cache hit for {} ({})", ticker, window);
            return Ok(series);
        }

        info!("Cache miss for {} ({}), requesting history", ticker, window);
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        let series = self.provider.history(ticker, window).await?;
        info!("Fetched {} rows for {} ({})", series.len(), ticker, window);

        self.cache.insert(ticker, window, series.clone()).await;
        Ok(series)
    }

    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &Arc<SeriesCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceBar;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        calls: AtomicUsize,
        rows: usize,
    }

    #[async_trait]
    impl QuoteProvider for CountingProvider {
        async fn history(&self, ticker: &str, _window: Window) -> Result<PriceSeries, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ticker == "ZZZZINVALID" {
                return Ok(PriceSeries::empty());
            }
            if ticker == "DOWN" {
                return Err(FetchError::Provider("connection reset".into()));
            }
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let bars = (0..self.rows)
                .map(|i| PriceBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.0 + i as f64,
                    volume: 1_000,
                })
                .collect();
            Ok(PriceSeries::from_bars(bars))
        }
    }

    fn fetcher(policy: EvictionPolicy) -> (Arc<CountingProvider>, MarketDataFetcher) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            rows: 5,
        });
        let fetcher = MarketDataFetcher::new(provider.clone(), Arc::new(SeriesCache::new(policy)));
        (provider, fetcher)
    }

    #[tokio::test]
    async fn repeated_pair_is_served_from_cache() {
        let (provider, fetcher) = fetcher(EvictionPolicy::Never);
        let first = fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        let second = fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.remote_calls(), 1);
    }

    #[tokio::test]
    async fn different_window_is_a_different_key() {
        let (provider, fetcher) = fetcher(EvictionPolicy::Never);
        fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        fetcher.fetch("AAPL", Window::FiveDays).await.unwrap();
        fetcher.fetch("MSFT", Window::OneMonth).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.cache().len().await, 3);
    }

    #[tokio::test]
    async fn empty_results_are_memoized() {
        let (provider, fetcher) = fetcher(EvictionPolicy::Never);
        assert!(fetcher.fetch("ZZZZINVALID", Window::OneYear).await.unwrap().is_empty());
        assert!(fetcher.fetch("ZZZZINVALID", Window::OneYear).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_propagate_and_are_not_cached() {
        let (provider, fetcher) = fetcher(EvictionPolicy::Never);
        assert!(fetcher.fetch("DOWN", Window::OneMonth).await.is_err());
        assert!(fetcher.fetch("DOWN", Window::OneMonth).await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(fetcher.cache().is_empty().await);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let (provider, fetcher) = fetcher(EvictionPolicy::ExpireAfter(Duration::ZERO));
        fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.cache().purge_expired().await, 1);
        assert!(fetcher.cache().is_empty().await);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_pile_up_under_a_ttl() {
        let (provider, fetcher) = fetcher(EvictionPolicy::ExpireAfter(Duration::ZERO));
        for i in 0..1000 {
            fetcher.fetch(&format!("T{}", i), Window::OneMonth).await.unwrap();
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1000);
        // Only the entry stored last can still be in the map
        assert_eq!(fetcher.cache().len().await, 1);
    }

    #[tokio::test]
    async fn fresh_entries_survive_the_sweep() {
        let (provider, fetcher) = fetcher(EvictionPolicy::ExpireAfter(Duration::from_secs(3600)));
        fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        fetcher.fetch("MSFT", Window::OneMonth).await.unwrap();
        fetcher.fetch("AAPL", Window::OneMonth).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.cache().len().await, 2);
    }

    #[tokio::test]
    async fn never_policy_keeps_everything() {
        let (_, fetcher) = fetcher(EvictionPolicy::Never);
        for i in 0..20 {
            fetcher.fetch(&format!("T{}", i), Window::FiveDays).await.unwrap();
        }
        assert_eq!(fetcher.cache().len().await, 20);
        assert_eq!(fetcher.cache().policy(), EvictionPolicy::Never);
        assert_eq!(fetcher.cache().purge_expired().await, 0);
    }
}
