use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::AtlasConfig;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the global Prometheus recorder and publishes the static
    /// config gauges. Must run before any counter fires, or those early
    /// increments land in the void.
    pub fn init(config: &AtlasConfig) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_gauge!(
            "scrape_cache_default_ttl_secs",
            "Configured fallback cache TTL in seconds."
        );
        describe_gauge!(
            "scrape_deadline_secs",
            "Configured comprehensive-run deadline in seconds (0 = unlimited)."
        );
        gauge!("scrape_cache_default_ttl_secs").set(config.cache.default_ttl_secs as f64);
        gauge!("scrape_deadline_secs").set(config.scrape.deadline_secs as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
