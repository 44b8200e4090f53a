//! # Resolution cascade
//! Tiers, checked strictly in this order on every call:
//! 1. item catalog      → return (authoritative, no cache write)
//! 2. freshness cache   → return
//! 3. source catalog    → synthesize from source rating, return (not cached)
//! 4. remote classifier → cache + return on success; on failure return the
//!    "AI Failed" value without caching it, so the next request retries.
//!
//! `resolve` never fails: backend errors are absorbed at their origin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::cache::FreshnessCache;
use crate::catalog::Catalogs;
use crate::classifier::{ClassifierFailure, DynClassifier};
use crate::config::DEFAULT_BATCH_CONCURRENCY;
use crate::model::{Classification, Item};

pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Which tier answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ItemCatalog,
    Cache,
    SourceCatalog,
    Classifier,
    ClassifierFailed,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::ItemCatalog => "item_catalog",
            Tier::Cache => "cache",
            Tier::SourceCatalog => "source_catalog",
            Tier::Classifier => "classifier",
            Tier::ClassifierFailed => "classifier_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub classification: Classification,
    pub tier: Tier,
}

impl Resolution {
    fn new(classification: Classification, tier: Tier) -> Self {
        Self {
            classification,
            tier,
        }
    }
}

#[derive(Clone)]
pub struct ResolutionCascade {
    catalogs: Catalogs,
    cache: FreshnessCache,
    classifier: DynClassifier,
    classify_timeout: Duration,
    batch_permits: Arc<Semaphore>,
}

impl ResolutionCascade {
    pub fn new(catalogs: Catalogs, cache: FreshnessCache, classifier: DynClassifier) -> Self {
        Self {
            catalogs,
            cache,
            classifier,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            batch_permits: Arc::new(Semaphore::new(DEFAULT_BATCH_CONCURRENCY)),
        }
    }

    /// Hard upper bound on tier 4, whatever the classifier implementation does.
    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// Items of `resolve_many` in flight at once, shared by all batches on this cascade.
    pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    #[instrument(target = "cascade", skip(self, item), fields(id = %item.id, title = %item.title_digest()))]
    pub async fn resolve(&self, item: &Item) -> Resolution {
        let started = Instant::now();
        // Concurrent first calls share the single in-flight catalog load.
        self.catalogs.ensure_loaded().await;

        let resolution = self.resolve_tiers(item).await;

        counter!("resolver_resolve_total", "tier" => resolution.tier.as_str()).increment(1);
        histogram!("resolver_resolve_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        debug!(target: "cascade", tier = resolution.tier.as_str(), "resolved");
        resolution
    }

    /// Convenience for callers that only want the label.
    pub async fn resolve_classification(&self, item: &Item) -> Classification {
        self.resolve(item).await.classification
    }

    /// Resolve independently and concurrently, at most `batch_concurrency`
    /// at a time; output order matches input order.
    pub async fn resolve_many(&self, items: Vec<Item>) -> Vec<Resolution> {
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let this = self.clone();
                tokio::spawn(async move {
                    // the semaphore is never closed
                    let _permit = this.batch_permits.clone().acquire_owned().await.ok();
                    this.resolve(&item).await
                })
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await.unwrap_or_else(|e| {
                warn!(target: "cascade", error = %e, "resolve task aborted");
                Resolution::new(
                    ClassifierFailure::Transport("task aborted".into()).to_classification(),
                    Tier::ClassifierFailed,
                )
            }));
        }
        out
    }

    async fn resolve_tiers(&self, item: &Item) -> Resolution {
        if let Some(c) = self.catalogs.lookup_item(&item.id) {
            return Resolution::new(c, Tier::ItemCatalog);
        }

        if let Some(c) = self.cache.get(&item.id).await {
            return Resolution::new(c, Tier::Cache);
        }

        if let Some(rating) = self.catalogs.lookup_source(&item.channel) {
            return Resolution::new(rating.to_classification(), Tier::SourceCatalog);
        }

        match self.classify_bounded(item).await {
            Ok(c) => {
                if let Err(e) = self.cache.put(&item.id, &c).await {
                    counter!("resolver_cache_write_failures_total").increment(1);
                    warn!(target: "cascade", id = %item.id, error = %e, "cache write failed; result still returned");
                }
                Resolution::new(c, Tier::Classifier)
            }
            Err(f) => {
                counter!("resolver_classifier_failures_total", "reason" => f.reason()).increment(1);
                warn!(
                    target: "cascade",
                    id = %item.id,
                    reason = f.reason(),
                    classifier = self.classifier.name(),
                    error = %f,
                    "classifier failed; not caching"
                );
                Resolution::new(f.to_classification(), Tier::ClassifierFailed)
            }
        }
    }

    async fn classify_bounded(&self, item: &Item) -> Result<Classification, ClassifierFailure> {
        tokio::time::timeout(self.classify_timeout, self.classifier.classify(item))
            .await
            .unwrap_or(Err(ClassifierFailure::Timeout))
    }
}
