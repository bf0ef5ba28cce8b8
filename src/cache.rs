// src/cache.rs
//! Per-source TTL cache for scrape results.
//!
//! Keys are `source:normalized-identifier`. Only successful results are ever
//! stored: a failed fetch leaves the slot empty so the next request goes back
//! upstream. Cache trouble (a poisoned lock) is treated as a miss or a skipped
//! write, never as a request failure.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use metrics::counter;

use crate::normalize::normalize_identifier;
use crate::scrape::types::SourceResult;

/// Canonical cache key for a (source, identifier) pair.
pub fn cache_key(source: &str, identifier: &str) -> String {
    format!("{}:{}", source, normalize_identifier(identifier))
}

struct CacheEntry {
    value: SourceResult,
    expires_at: Instant,
}

/// Snapshot for the debug endpoint.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct ScrapeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScrapeCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Check → produce → store. On a fresh hit the producer never runs; on a
    /// miss the producer's success is stored for `ttl` and its error is
    /// returned uncached. Concurrent misses on the same key may each run the
    /// producer once; last write wins.
    pub async fn with_cache<F, Fut>(
        &self,
        source: &str,
        identifier: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<SourceResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SourceResult>>,
    {
        if !self.enabled {
            tracing::debug!(target: "cache", source, "cache disabled, fetching fresh");
            return producer().await;
        }

        let key = cache_key(source, identifier);

        // 1) Lookup. Expired entries count as misses.
        if let Some(hit) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("scrape_cache_hits_total").increment(1);
            tracing::debug!(target: "cache", %key, "cache hit");
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("scrape_cache_misses_total").increment(1);

        // 2) Produce. An error propagates and nothing is stored, so the slot
        //    stays empty and the next request retries upstream.
        let fresh = producer().await?;

        // 3) Store for `ttl`.
        self.store(key, fresh.clone(), ttl);
        Ok(fresh)
    }

    fn lookup(&self, key: &str) -> Option<SourceResult> {
        let guard = match self.entries.read() {
            Ok(g) => g,
            // Poisoned lock: behave as a miss.
            Err(_) => return None,
        };
        let entry = guard.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    fn store(&self, key: String, value: SourceResult, ttl: Duration) {
        if let Ok(mut guard) = self.entries.write() {
            let now = Instant::now();
            // One store per miss, and a miss already paid for a network
            // round-trip; sweeping dead entries here is cheap next to that.
            guard.retain(|_, e| e.expires_at > now);
            guard.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: now + ttl,
                },
            );
        }
        // Poisoned lock: skip the write, the result still reaches the caller.
    }

    /// Drop entries. No filters clears everything; `source` keeps only other
    /// sources; `identifier` keeps only other identifiers. Returns how many
    /// entries were removed.
    pub fn purge(&self, source: Option<&str>, identifier: Option<&str>) -> usize {
        let Ok(mut guard) = self.entries.write() else {
            return 0;
        };
        let before = guard.len();
        match (source, identifier) {
            (None, None) => guard.clear(),
            (src, id) => {
                let id_norm = id.map(normalize_identifier);
                guard.retain(|key, _| {
                    let (key_src, key_id) = key.split_once(':').unwrap_or((key.as_str(), ""));
                    let src_match = src.map(|s| s == key_src).unwrap_or(true);
                    let id_match = id_norm.as_deref().map(|i| i == key_id).unwrap_or(true);
                    // Retain what does NOT match every given filter.
                    !(src_match && id_match)
                });
            }
        }
        before - guard.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self
            .entries
            .read()
            .map(|g| g.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0);
        CacheStats {
            enabled: self.enabled,
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn mk_result(source: &str, id: &str) -> SourceResult {
        SourceResult::new(source, id, json!({"ok": true}))
            .with_confidence(90)
            .with_item_count(2)
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = ScrapeCache::new(true);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let got = cache
                .with_cache("github", "octocat", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(mk_result("github", "octocat"))
                })
                .await
                .unwrap();
            assert_eq!(got.source, "github");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn identifier_variants_share_one_entry() {
        let cache = ScrapeCache::new(true);
        let calls = AtomicUsize::new(0);

        for id in ["OctoCat", "  octocat ", "octocat"] {
            cache
                .with_cache("github", id, Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(mk_result("github", id))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ScrapeCache::new(true);
        let calls = AtomicUsize::new(0);

        let err = cache
            .with_cache("github", "ghost", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("upstream down")
            })
            .await;
        assert!(err.is_err());

        // Next call goes upstream again and its success is stored.
        let ok = cache
            .with_cache("github", "ghost", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(mk_result("github", "ghost"))
            })
            .await;
        assert!(ok.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().entries, 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_refetch() {
        let cache = ScrapeCache::new(true);
        let calls = AtomicUsize::new(0);

        let ttl = Duration::from_millis(20);
        for _ in 0..2 {
            cache
                .with_cache("github", "octocat", ttl, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(mk_result("github", "octocat"))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Sleep well past the TTL, then the entry must be refreshed.
        tokio::time::sleep(ttl * 5).await;
        cache
            .with_cache("github", "octocat", ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(mk_result("github", "octocat"))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let cache = ScrapeCache::new(false);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .with_cache("github", "octocat", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(mk_result("github", "octocat"))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn purge_filters_by_source_and_identifier() {
        let cache = ScrapeCache::new(true);
        let ttl = Duration::from_secs(60);
        for (src, id) in [("github", "a"), ("github", "b"), ("reddit", "a")] {
            cache
                .with_cache(src, id, ttl, || async { Ok(mk_result(src, id)) })
                .await
                .unwrap();
        }
        assert_eq!(cache.stats().entries, 3);

        assert_eq!(cache.purge(Some("github"), Some("a")), 1);
        assert_eq!(cache.stats().entries, 2);

        assert_eq!(cache.purge(None, Some("a")), 1);
        assert_eq!(cache.stats().entries, 1);

        assert_eq!(cache.purge(None, None), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn key_includes_source_prefix() {
        assert_eq!(cache_key("github", "OctoCat"), "github:octocat");
        assert_ne!(cache_key("github", "x"), cache_key("reddit", "x"));
    }
}
