use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// The global recorder can be installed once per process; tests build many apps.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install (or reuse) the Prometheus recorder and publish the cache TTL gauge.
    pub fn init(ttl_ms: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();

        describe_counter!("resolver_resolve_total", "Resolutions by answering tier.");
        describe_histogram!("resolver_resolve_duration_ms", "End-to-end resolve latency.");
        describe_counter!(
            "resolver_cache_write_failures_total",
            "Tier-4 results that could not be persisted."
        );
        describe_counter!(
            "resolver_classifier_failures_total",
            "Classifier failures by reason."
        );
        describe_counter!("resolver_catalog_loads_total", "Completed catalog loads.");
        describe_gauge!("resolver_catalog_entries", "Entries in the current catalog snapshot.");
        describe_gauge!("resolver_cache_ttl_ms", "Configured cache TTL.");

        gauge!("resolver_cache_ttl_ms").set(ttl_ms as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
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
