// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod cache;
pub mod cascade;
pub mod catalog;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod labels;
pub mod metrics;
pub mod model;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::cascade::{Resolution, ResolutionCascade, Tier};
pub use crate::config::ResolverConfig;
pub use crate::model::{Classification, EditorialBias, Factuality, Item, PoliticalLeaning};

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cache::{EntryStore, FileStore, FreshnessCache, MemoryStore};
use crate::catalog::{spawn_refresh_task, Catalogs, HttpCatalogSource};
use crate::classifier::build_classifier;
use crate::clock::SystemClock;

/// Install the global tracing subscriber. `RUST_LOG` wins; `LOG_FORMAT=json`
/// switches to JSON lines. A second call (or a runtime that already installed
/// one) is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ytruth_resolver=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Wire catalogs, cache and classifier from config.
pub fn build_cascade(cfg: &ResolverConfig) -> anyhow::Result<ResolutionCascade> {
    let source = HttpCatalogSource::new(
        cfg.catalogs.items_url.clone(),
        cfg.catalogs.sources_url.clone(),
        cfg.fetch_timeout(),
    )
    .context("building catalog HTTP client")?;
    let catalogs = Catalogs::new(Arc::new(source));

    let store: Arc<dyn EntryStore> = if cfg.cache.dir.trim().is_empty() {
        warn!(target: "cache", "no cache dir configured; results will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(cfg.cache.dir.trim()))
    };
    let cache = FreshnessCache::new(store, cfg.cache_ttl(), Arc::new(SystemClock));

    let classifier = build_classifier(&cfg.classifier);
    info!(
        classifier = classifier.name(),
        cache = cache.store_name(),
        ttl_secs = cfg.cache.ttl_secs,
        "cascade configured"
    );

    Ok(ResolutionCascade::new(catalogs, cache, classifier)
        .with_classify_timeout(cfg.classifier.timeout())
        .with_batch_concurrency(cfg.api.batch_concurrency))
}

/// Build the full in-process app from config + env: router, `/metrics`, the
/// eager first catalog load and (if configured) the periodic refresh.
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = ResolverConfig::load()?;
    app_with_config(&cfg).await
}

pub async fn app_with_config(cfg: &ResolverConfig) -> anyhow::Result<axum::Router> {
    let cascade = build_cascade(cfg)?;

    let catalogs = cascade.catalogs().clone();
    tokio::spawn(async move {
        catalogs.ensure_loaded().await;
    });
    if let Some(every) = cfg.refresh_interval() {
        spawn_refresh_task(cascade.catalogs().clone(), every);
    }

    let ttl_ms = u64::try_from(cfg.cache_ttl().as_millis()).unwrap_or(u64::MAX);
    let metrics = crate::metrics::Metrics::init(ttl_ms)?;

    let state = AppState::new(cascade).with_max_batch_items(cfg.api.max_batch_items);
    Ok(router(state).merge(metrics.router()))
}
