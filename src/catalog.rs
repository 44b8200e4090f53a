//! # Static catalogs
//!
//! Two curated mappings fetched from static JSON documents:
//! - item catalog: `{ "videos": { <id>: Classification } }`
//! - source catalog: `{ "channels": { <name>: { political_leaning, factuality } } }`
//!
//! A load fetches both halves concurrently. A failed half becomes empty; the
//! other half is unaffected. Every load swaps in a whole new `CatalogSnapshot`,
//! so lookups never see old items mixed with new sources.
//!
//! Loads are single-flight: concurrent `ensure_loaded`/`reload` calls share
//! one in-flight fetch.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::model::{Classification, EditorialBias, Factuality, PoliticalLeaning};

/// Source-level rating; carries no editorial bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRating {
    #[serde(default, alias = "politicalLeaning")]
    pub political_leaning: PoliticalLeaning,
    #[serde(default)]
    pub factuality: Factuality,
}

impl SourceRating {
    pub fn to_classification(&self) -> Classification {
        Classification::new(self.factuality, self.political_leaning, EditorialBias::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogHalf {
    Items,
    Sources,
}

impl fmt::Display for CatalogHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CatalogHalf::Items => "item",
            CatalogHalf::Sources => "source",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogLoadFailure {
    #[error("{half} catalog request failed: {message}")]
    Transport { half: CatalogHalf, message: String },
    #[error("{half} catalog returned HTTP {status}")]
    Http { half: CatalogHalf, status: u16 },
    #[error("{half} catalog document malformed: {message}")]
    Parse { half: CatalogHalf, message: String },
}

/// Outcome of one load; failures are per half and never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogLoadReport {
    pub generation: u64,
    pub items: usize,
    pub sources: usize,
    pub failures: Vec<CatalogLoadFailure>,
}

/* ----------------------------
Snapshot
---------------------------- */

#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    items: HashMap<String, Classification>,
    sources: HashMap<String, SourceRating>,
    sources_normalized: HashMap<String, SourceRating>,
    loaded_at: Option<DateTime<Utc>>,
    report: CatalogLoadReport,
}

impl CatalogSnapshot {
    pub fn new(
        items: HashMap<String, Classification>,
        sources: HashMap<String, SourceRating>,
    ) -> Self {
        let mut sources_normalized = HashMap::with_capacity(sources.len());
        for (name, rating) in &sources {
            sources_normalized.entry(normalize_source(name)).or_insert(*rating);
        }
        Self {
            items,
            sources,
            sources_normalized,
            loaded_at: None,
            report: CatalogLoadReport::default(),
        }
    }

    pub fn lookup_item(&self, id: &str) -> Option<&Classification> {
        self.items.get(id)
    }

    /// Exact name first, then the normalized form ("The Daily Show" == "the  daily-show").
    pub fn lookup_source(&self, name: &str) -> Option<SourceRating> {
        self.sources
            .get(name)
            .or_else(|| self.sources_normalized.get(&normalize_source(name)))
            .copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn report(&self) -> &CatalogLoadReport {
        &self.report
    }
}

/// Lowercase, dashes/underscores/dots to spaces, collapse whitespace.
fn normalize_source(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '.', ',', '\''] {
        out = out.replace(ch, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/* ----------------------------
Fetching
---------------------------- */

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_items(&self) -> Result<HashMap<String, Classification>, CatalogLoadFailure>;
    async fn fetch_sources(&self) -> Result<HashMap<String, SourceRating>, CatalogLoadFailure>;
}

#[derive(Deserialize)]
struct ItemDocument {
    videos: HashMap<String, Classification>,
}

#[derive(Deserialize)]
struct SourceDocument {
    channels: HashMap<String, SourceRating>,
}

/// Fetches the two documents over HTTP(S).
pub struct HttpCatalogSource {
    http: reqwest::Client,
    items_url: String,
    sources_url: String,
}

impl HttpCatalogSource {
    pub fn new(
        items_url: impl Into<String>,
        sources_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ytruth-resolver/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            items_url: items_url.into(),
            sources_url: sources_url.into(),
        })
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        half: CatalogHalf,
        url: &str,
    ) -> Result<T, CatalogLoadFailure> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogLoadFailure::Transport {
                half,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogLoadFailure::Http {
                half,
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| CatalogLoadFailure::Transport {
            half,
            message: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CatalogLoadFailure::Parse {
            half,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_items(&self) -> Result<HashMap<String, Classification>, CatalogLoadFailure> {
        let doc: ItemDocument = self.fetch_json(CatalogHalf::Items, &self.items_url).await?;
        Ok(doc.videos)
    }

    async fn fetch_sources(&self) -> Result<HashMap<String, SourceRating>, CatalogLoadFailure> {
        let doc: SourceDocument = self
            .fetch_json(CatalogHalf::Sources, &self.sources_url)
            .await?;
        Ok(doc.channels)
    }
}

/// Fixed in-process catalogs (offline runs, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    pub items: HashMap<String, Classification>,
    pub sources: HashMap<String, SourceRating>,
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_items(&self) -> Result<HashMap<String, Classification>, CatalogLoadFailure> {
        Ok(self.items.clone())
    }

    async fn fetch_sources(&self) -> Result<HashMap<String, SourceRating>, CatalogLoadFailure> {
        Ok(self.sources.clone())
    }
}

/* ----------------------------
Reloadable handle
---------------------------- */

/// Cheap to clone; all clones share one snapshot and one load gate.
#[derive(Clone)]
pub struct Catalogs {
    inner: Arc<CatalogsInner>,
}

struct CatalogsInner {
    source: Arc<dyn CatalogSource>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    load_gate: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl Catalogs {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            inner: Arc::new(CatalogsInner {
                source,
                snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
                load_gate: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.inner.snapshot.read() {
            Ok(g) => Arc::clone(&g),
            Err(p) => Arc::clone(&p.into_inner()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    pub fn is_loaded(&self) -> bool {
        self.generation() > 0
    }

    pub fn lookup_item(&self, id: &str) -> Option<Classification> {
        self.snapshot().lookup_item(id).cloned()
    }

    pub fn lookup_source(&self, name: &str) -> Option<SourceRating> {
        self.snapshot().lookup_source(name)
    }

    /// Load once per process. Returns `None` when a load had already completed.
    pub async fn ensure_loaded(&self) -> Option<CatalogLoadReport> {
        if self.is_loaded() {
            return None;
        }
        let _gate = self.inner.load_gate.lock().await;
        if self.is_loaded() {
            return None;
        }
        Some(self.load_locked().await)
    }

    /// Force a fresh load. Callers that queued behind an in-flight load get its report.
    pub async fn reload(&self) -> CatalogLoadReport {
        let seen = self.generation();
        let _gate = self.inner.load_gate.lock().await;
        if self.generation() != seen {
            return self.snapshot().report().clone();
        }
        self.load_locked().await
    }

    async fn load_locked(&self) -> CatalogLoadReport {
        let (items, sources) = tokio::join!(
            self.inner.source.fetch_items(),
            self.inner.source.fetch_sources()
        );

        let mut failures = Vec::new();
        let items = items.unwrap_or_else(|e| {
            warn!(target: "catalog", error = %e, "item catalog load failed; using empty");
            failures.push(e);
            HashMap::new()
        });
        let sources = sources.unwrap_or_else(|e| {
            warn!(target: "catalog", error = %e, "source catalog load failed; using empty");
            failures.push(e);
            HashMap::new()
        });

        let generation = self.generation() + 1;
        let mut snapshot = CatalogSnapshot::new(items, sources);
        snapshot.loaded_at = Some(Utc::now());
        snapshot.report = CatalogLoadReport {
            generation,
            items: snapshot.item_count(),
            sources: snapshot.source_count(),
            failures,
        };
        let report = snapshot.report.clone();

        {
            let mut g = match self.inner.snapshot.write() {
                Ok(g) => g,
                Err(p) => p.into_inner(),
            };
            *g = Arc::new(snapshot);
        }
        self.inner.generation.store(generation, Ordering::Release);

        counter!("resolver_catalog_loads_total").increment(1);
        gauge!("resolver_catalog_entries", "kind" => "items").set(report.items as f64);
        gauge!("resolver_catalog_entries", "kind" => "sources").set(report.sources as f64);
        info!(
            target: "catalog",
            generation,
            items = report.items,
            sources = report.sources,
            failures = report.failures.len(),
            "catalog snapshot swapped"
        );
        report
    }
}

/// Reload every `interval`. The first tick is skipped; the initial load
/// happens through `ensure_loaded`.
pub fn spawn_refresh_task(catalogs: Catalogs, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = catalogs.reload().await;
            tracing::debug!(target: "catalog", generation = report.generation, "periodic catalog refresh");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Scripted source: each fetch pops the next outcome (or repeats the last).
    struct ScriptedSource {
        items: Mutex<Vec<Result<HashMap<String, Classification>, CatalogLoadFailure>>>,
        sources: Mutex<Vec<Result<HashMap<String, SourceRating>, CatalogLoadFailure>>>,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(
            items: Vec<Result<HashMap<String, Classification>, CatalogLoadFailure>>,
            sources: Vec<Result<HashMap<String, SourceRating>, CatalogLoadFailure>>,
        ) -> Self {
            Self {
                items: Mutex::new(items),
                sources: Mutex::new(sources),
                fetches: AtomicUsize::new(0),
                delay: Duration::from_millis(0),
            }
        }

        fn next<T: Clone>(q: &Mutex<Vec<T>>) -> T {
            let mut g = q.lock().unwrap();
            if g.len() > 1 {
                g.remove(0)
            } else {
                g[0].clone()
            }
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedSource {
        async fn fetch_items(&self) -> Result<HashMap<String, Classification>, CatalogLoadFailure> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Self::next(&self.items)
        }

        async fn fetch_sources(&self) -> Result<HashMap<String, SourceRating>, CatalogLoadFailure> {
            tokio::time::sleep(self.delay).await;
            Self::next(&self.sources)
        }
    }

    fn items_ok() -> Result<HashMap<String, Classification>, CatalogLoadFailure> {
        Ok(HashMap::from([(
            "vid1".to_string(),
            Classification::new(Factuality::High, PoliticalLeaning::Left, EditorialBias::News),
        )]))
    }

    fn sources_ok() -> Result<HashMap<String, SourceRating>, CatalogLoadFailure> {
        Ok(HashMap::from([(
            "Example News".to_string(),
            SourceRating {
                political_leaning: PoliticalLeaning::Right,
                factuality: Factuality::Mixed,
            },
        )]))
    }

    fn http_fail(half: CatalogHalf) -> CatalogLoadFailure {
        CatalogLoadFailure::Http { half, status: 503 }
    }

    #[tokio::test]
    async fn load_populates_both_halves() {
        let catalogs = Catalogs::new(Arc::new(ScriptedSource::new(vec![items_ok()], vec![sources_ok()])));
        assert!(catalogs.lookup_item("vid1").is_none(), "nothing before load");

        let report = catalogs.ensure_loaded().await.expect("first load runs");
        assert_eq!(report.generation, 1);
        assert_eq!((report.items, report.sources), (1, 1));
        assert!(report.failures.is_empty());
        assert!(catalogs.lookup_item("vid1").is_some());
        assert_eq!(
            catalogs.lookup_source("Example News").map(|r| r.factuality),
            Some(Factuality::Mixed)
        );
        assert!(catalogs.ensure_loaded().await.is_none(), "second ensure is a no-op");
    }

    #[tokio::test]
    async fn one_failed_half_does_not_block_the_other() {
        let catalogs = Catalogs::new(Arc::new(ScriptedSource::new(
            vec![Err(http_fail(CatalogHalf::Items))],
            vec![sources_ok()],
        )));
        let report = catalogs.reload().await;
        assert_eq!(report.items, 0);
        assert_eq!(report.sources, 1);
        assert_eq!(report.failures, vec![http_fail(CatalogHalf::Items)]);
        assert!(catalogs.lookup_source("Example News").is_some());
    }

    #[tokio::test]
    async fn failed_reload_never_keeps_previous_data() {
        let catalogs = Catalogs::new(Arc::new(ScriptedSource::new(
            vec![items_ok(), Err(http_fail(CatalogHalf::Items))],
            vec![
                sources_ok(),
                Err(CatalogLoadFailure::Parse {
                    half: CatalogHalf::Sources,
                    message: "eof".into(),
                }),
            ],
        )));
        catalogs.reload().await;
        assert!(catalogs.lookup_item("vid1").is_some());

        let report = catalogs.reload().await;
        assert_eq!(report.failures.len(), 2);
        assert!(catalogs.lookup_item("vid1").is_none());
        assert!(catalogs.lookup_source("Example News").is_none());
        assert_eq!(catalogs.generation(), 2);
    }

    #[tokio::test]
    async fn concurrent_triggers_collapse_into_one_fetch() {
        let mut src = ScriptedSource::new(vec![items_ok()], vec![sources_ok()]);
        src.delay = Duration::from_millis(50);
        let src = Arc::new(src);
        let catalogs = Catalogs::new(src.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = catalogs.clone();
            handles.push(tokio::spawn(async move { c.ensure_loaded().await }));
        }
        let mut ran = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                ran += 1;
            }
        }
        assert_eq!(ran, 1);
        assert_eq!(src.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queued_reload_reuses_in_flight_result() {
        let mut src = ScriptedSource::new(vec![items_ok()], vec![sources_ok()]);
        src.delay = Duration::from_millis(50);
        let src = Arc::new(src);
        let catalogs = Catalogs::new(src.clone());

        let (a, b) = tokio::join!(catalogs.reload(), catalogs.reload());
        assert_eq!(a, b);
        assert_eq!(a.generation, 1);
        assert_eq!(src.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_task_reloads_on_every_interval() {
        let src = Arc::new(ScriptedSource::new(vec![items_ok()], vec![sources_ok()]));
        let catalogs = Catalogs::new(src.clone());
        catalogs.ensure_loaded().await;
        assert_eq!(catalogs.generation(), 1);

        let every = Duration::from_secs(60);
        let handle = spawn_refresh_task(catalogs.clone(), every);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(catalogs.generation(), 1, "no reload on the immediate tick");

        tokio::time::sleep(every * 2).await;
        assert_eq!(catalogs.generation(), 3);
        assert_eq!(src.fetches.load(Ordering::SeqCst), 3);
        assert!(catalogs.lookup_item("vid1").is_some());

        handle.abort();
    }

    #[test]
    fn source_lookup_falls_back_to_normalized_name() {
        let snap = CatalogSnapshot::new(HashMap::new(), sources_ok().unwrap());
        assert!(snap.lookup_source("Example News").is_some());
        assert!(snap.lookup_source("  example-news ").is_some());
        assert!(snap.lookup_source("EXAMPLE   NEWS").is_some());
        assert!(snap.lookup_source("Example").is_none());
    }

    #[test]
    fn source_document_parses_with_unknown_values() {
        let raw = r#"{"channels": {
            "A": {"political_leaning": "Left", "factuality": "High"},
            "B": {"political_leaning": "Pro-Something", "factuality": 3}
        }}"#;
        let doc: SourceDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.channels["A"].political_leaning, PoliticalLeaning::Left);
        assert_eq!(doc.channels["B"].political_leaning, PoliticalLeaning::Unknown);
        assert_eq!(doc.channels["B"].factuality, Factuality::Unknown);
        assert_eq!(
            doc.channels["A"].to_classification().editorial_bias(),
            EditorialBias::Unknown
        );
    }
}
