// src/scrape/mod.rs
pub mod meta;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::cache::ScrapeCache;
use crate::config::AtlasConfig;
use crate::registry::SourceRegistry;
use crate::scrape::types::{
    AdapterError, AggregateResult, FetchOutcome, SourceAdapter, SourceOutcome, SourceResult,
};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_runs_total", "Comprehensive runs started.");
        describe_counter!("scrape_fetch_success_total", "Fresh per-source fetches that succeeded.");
        describe_counter!("scrape_fetch_errors_total", "Fresh per-source fetches that failed.");
        describe_counter!("scrape_cache_hits_total", "Cache hits across all sources.");
        describe_counter!("scrape_cache_misses_total", "Cache misses across all sources.");
        describe_histogram!("scrape_fetch_duration_ms", "Fresh fetch time per source, ms.");
        describe_histogram!("scrape_run_duration_ms", "Whole comprehensive run time, ms.");
        describe_gauge!("scrape_last_run_ts", "Unix ts of the last comprehensive run.");
    });
}

/// The fan-out engine: one cached fetch task per requested source, a
/// settle-all join, then one aggregate envelope.
pub struct ScrapeEngine {
    registry: Arc<SourceRegistry>,
    cache: Arc<ScrapeCache>,
    config: Arc<AtlasConfig>,
}

impl ScrapeEngine {
    pub fn new(
        registry: Arc<SourceRegistry>,
        cache: Arc<ScrapeCache>,
        config: Arc<AtlasConfig>,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run every requested source concurrently and aggregate the outcomes.
    ///
    /// Never short-circuits: each source settles as a success or a failure
    /// value, and the envelope always carries one slot per resolved source.
    /// Only a blank identifier is a request-level error.
    pub async fn run_comprehensive(
        &self,
        identifier: &str,
        requested: &[String],
    ) -> Result<AggregateResult> {
        ensure_metrics_described();
        let identifier = identifier.trim();
        if identifier.is_empty() {
            anyhow::bail!("identifier must not be empty");
        }

        let started = Instant::now();
        let resolved = self.registry.resolve(requested);
        // The deadline is one absolute instant shared by all sources.
        let deadline = self
            .config
            .scrape
            .deadline()
            .map(|d| (tokio::time::Instant::now() + d, d));

        counter!("scrape_runs_total").increment(1);
        tracing::info!(
            target: "scrape",
            identifier,
            sources = resolved.len(),
            "comprehensive run started"
        );

        // One task per known source; unknown names settle as failures below.
        let mut pending: Vec<(String, Option<JoinHandle<Result<SourceResult>>>)> =
            Vec::with_capacity(resolved.len());
        for name in &resolved {
            let handle = self.registry.get(name).map(|adapter| {
                let cache = Arc::clone(&self.cache);
                let ttl = self.config.cache.ttl_for(name);
                tokio::spawn(fetch_through_cache(
                    cache,
                    adapter,
                    identifier.to_string(),
                    ttl,
                ))
            });
            pending.push((name.clone(), handle));
        }

        // Settle-all barrier: every task joins (or hits the shared deadline)
        // before the envelope is built.
        let mut outcomes = Vec::with_capacity(pending.len());
        for (name, handle) in pending {
            let outcome = match handle {
                None => FetchOutcome::failure(&name, format!("Unknown source '{name}'")),
                Some(handle) => settle(name, handle, deadline).await,
            };
            outcomes.push(outcome);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let metadata = meta::build_metadata(&resolved, &outcomes, elapsed_ms);
        histogram!("scrape_run_duration_ms").record(elapsed_ms as f64);
        gauge!("scrape_last_run_ts").set(now_unix() as f64);
        tracing::info!(
            target: "scrape",
            identifier,
            succeeded = metadata.sources_succeeded.len(),
            failed = metadata.sources_failed.len(),
            total_data_points = metadata.total_data_points,
            elapsed_ms,
            "comprehensive run finished"
        );

        let mut results = BTreeMap::new();
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Success(res) => {
                    results.insert(res.source.clone(), SourceOutcome::Success(res))
                }
                FetchOutcome::Failure(err) => {
                    results.insert(err.source.clone(), SourceOutcome::Error { error: err.cause })
                }
            };
        }

        Ok(AggregateResult {
            identifier: identifier.to_string(),
            timestamp: Utc::now(),
            results,
            metadata,
        })
    }

    /// Fetch one source through the cache, for the per-source endpoint.
    pub async fn run_single(&self, source: &str, identifier: &str) -> Result<SourceResult> {
        ensure_metrics_described();
        let identifier = identifier.trim();
        if identifier.is_empty() {
            anyhow::bail!("identifier must not be empty");
        }
        let name = source.trim().to_ascii_lowercase();
        let adapter = self
            .registry
            .get(&name)
            .with_context(|| format!("Unknown source '{name}'"))?;
        let ttl = self.config.cache.ttl_for(&name);
        fetch_through_cache(
            Arc::clone(&self.cache),
            adapter,
            identifier.to_string(),
            ttl,
        )
        .await
    }
}

/// Cache check → fresh fetch → store. Lives outside the engine so spawned
/// tasks can own every input.
async fn fetch_through_cache(
    cache: Arc<ScrapeCache>,
    adapter: Arc<dyn SourceAdapter>,
    identifier: String,
    ttl: Duration,
) -> Result<SourceResult> {
    let source = adapter.name();
    cache
        .with_cache(source, &identifier, ttl, || {
            instrumented_fetch(adapter.clone(), identifier.clone())
        })
        .await
}

/// A fresh upstream fetch with the per-fetch log record and metrics. Cache
/// hits never pass through here, so a hit emits no fetch log line.
async fn instrumented_fetch(
    adapter: Arc<dyn SourceAdapter>,
    identifier: String,
) -> Result<SourceResult> {
    let source = adapter.name();
    let started = Instant::now();
    let result = adapter.fetch(&identifier).await;
    let duration_ms = started.elapsed().as_millis() as u64;
    histogram!("scrape_fetch_duration_ms").record(duration_ms as f64);
    match &result {
        Ok(res) => {
            counter!("scrape_fetch_success_total").increment(1);
            tracing::info!(
                target: "scrape",
                source,
                identifier = %identifier,
                duration_ms,
                success = true,
                item_count = res.item_count,
                "fetch complete"
            );
        }
        Err(err) => {
            counter!("scrape_fetch_errors_total").increment(1);
            tracing::warn!(
                target: "scrape",
                source,
                identifier = %identifier,
                duration_ms,
                success = false,
                error = %format!("{err:#}"),
                "fetch failed"
            );
        }
    }
    result
}

/// Join one task, converting panics, cancellations and the run deadline into
/// per-source failure values.
async fn settle(
    source: String,
    mut handle: JoinHandle<Result<SourceResult>>,
    deadline: Option<(tokio::time::Instant, Duration)>,
) -> FetchOutcome {
    let joined = match deadline {
        None => handle.await,
        Some((at, total)) => {
            let remaining = at.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    handle.abort();
                    return FetchOutcome::failure(
                        &source,
                        format!("timed out after {}ms", total.as_millis()),
                    );
                }
            }
        }
    };
    match joined {
        Ok(Ok(res)) => FetchOutcome::Success(res),
        Ok(Err(err)) => FetchOutcome::Failure(AdapterError::new(&source, format!("{err:#}"))),
        Err(join_err) => FetchOutcome::failure(&source, format!("scrape task failed: {join_err}")),
    }
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtlasConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OkSource {
        name: &'static str,
        items: u64,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for OkSource {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
            Ok(SourceResult::new(self.name, identifier, json!({"n": self.items}))
                .with_confidence(90)
                .with_item_count(self.items))
        }
    }

    struct FailSource(&'static str);

    #[async_trait::async_trait]
    impl SourceAdapter for FailSource {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn fetch(&self, _identifier: &str) -> Result<SourceResult> {
            anyhow::bail!("upstream exploded")
        }
    }

    struct SlowSource(&'static str);

    #[async_trait::async_trait]
    impl SourceAdapter for SlowSource {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(SourceResult::new(self.0, identifier, json!({})))
        }
    }

    struct CountingSource {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for CountingSource {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SourceResult::new(self.name, identifier, json!({})).with_item_count(1))
        }
    }

    fn engine_with(registry: SourceRegistry, deadline_secs: u64) -> ScrapeEngine {
        let mut config = AtlasConfig::default();
        config.scrape.deadline_secs = deadline_secs;
        ScrapeEngine::new(
            Arc::new(registry),
            Arc::new(ScrapeCache::new(true)),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn one_slot_per_resolved_source() {
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(OkSource { name: "github", items: 2 }));
        reg.register(Arc::new(OkSource { name: "reddit", items: 3 }));
        let engine = engine_with(reg, 0);

        let out = engine
            .run_comprehensive("octocat", &["all".into()])
            .await
            .unwrap();
        assert_eq!(out.results.len(), 2);
        assert!(out.results.contains_key("github"));
        assert!(out.results.contains_key("reddit"));
        assert_eq!(out.metadata.total_data_points, 5);
        assert_eq!(out.identifier, "octocat");
    }

    #[tokio::test]
    async fn one_failing_source_never_sinks_the_run() {
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(OkSource { name: "github", items: 1 }));
        reg.register(Arc::new(FailSource("reddit")));
        let engine = engine_with(reg, 0);

        let out = engine
            .run_comprehensive("octocat", &["all".into()])
            .await
            .unwrap();
        assert_eq!(out.metadata.sources_succeeded, vec!["github"]);
        assert_eq!(out.metadata.sources_failed, vec!["reddit"]);
        assert!((out.metadata.success_rate_percent - 50.0).abs() < f64::EPSILON);
        match &out.results["reddit"] {
            SourceOutcome::Error { error } => assert!(error.contains("upstream exploded")),
            other => panic!("expected error slot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_source_settles_as_failure() {
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(OkSource { name: "github", items: 1 }));
        let engine = engine_with(reg, 0);

        let out = engine
            .run_comprehensive("octocat", &["github".into(), "myspace".into()])
            .await
            .unwrap();
        assert_eq!(out.metadata.sources_failed, vec!["myspace"]);
        match &out.results["myspace"] {
            SourceOutcome::Error { error } => assert!(error.contains("Unknown source")),
            other => panic!("expected error slot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_hung_sources_into_failures() {
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(OkSource { name: "github", items: 1 }));
        reg.register(Arc::new(SlowSource("linkedin")));
        let engine = engine_with(reg, 2);

        let out = engine
            .run_comprehensive("octocat", &["all".into()])
            .await
            .unwrap();
        assert_eq!(out.metadata.sources_succeeded, vec!["github"]);
        assert_eq!(out.metadata.sources_failed, vec!["linkedin"]);
        match &out.results["linkedin"] {
            SourceOutcome::Error { error } => assert!(error.contains("timed out")),
            other => panic!("expected error slot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_identifier_is_a_request_error() {
        let engine = engine_with(SourceRegistry::new(), 0);
        assert!(engine.run_comprehensive("   ", &["all".into()]).await.is_err());
    }

    #[tokio::test]
    async fn run_single_uses_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(CountingSource {
            name: "github",
            calls: calls.clone(),
        }));
        let engine = engine_with(reg, 0);

        engine.run_single("github", "octocat").await.unwrap();
        engine.run_single("GitHub", "OctoCat").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(engine.run_single("myspace", "octocat").await.is_err());
    }
}
