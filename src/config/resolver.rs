// src/config/resolver.rs
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

use crate::classifier::DEFAULT_MIN_LABEL_SCORE;

pub const DEFAULT_CONFIG_PATH: &str = "config/resolver.toml";
pub const ENV_CONFIG_PATH: &str = "RESOLVER_CONFIG_PATH";

const DEFAULT_ITEMS_URL: &str =
    "https://raw.githubusercontent.com/YTruthIsOutThere/YTruth/main/data/video_database.json";
const DEFAULT_SOURCES_URL: &str =
    "https://raw.githubusercontent.com/YTruthIsOutThere/YTruth/main/data/bias_database.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 100;
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub catalogs: CatalogConfig,
    pub cache: CacheConfig,
    pub classifier: ClassifierConfig,
    pub api: ApiConfig,
}

/// Limits for `/resolve/batch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Larger batches are rejected with 422.
    pub max_batch_items: usize,
    /// Batch items resolved at the same time, across all requests.
    pub batch_concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub items_url: String,
    pub sources_url: String,
    pub fetch_timeout_secs: u64,
    /// 0 disables periodic refresh.
    pub refresh_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            items_url: DEFAULT_ITEMS_URL.to_string(),
            sources_url: DEFAULT_SOURCES_URL.to_string(),
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Empty means in-memory (nothing survives a restart).
    pub dir: String,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: "cache/analyses".to_string(),
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// Wire protocol spoken to the inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// `{ "videoData": { id, channel, title } }` to the project's own proxy.
    #[default]
    VideoData,
    /// Prompt + candidate labels straight to a zero-shot model.
    ZeroShot,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub enabled: bool,
    pub url: String,
    pub protocol: Protocol,
    /// "ENV" means: read from CLASSIFIER_API_KEY. Empty means no auth header.
    pub api_key: String,
    pub timeout_secs: u64,
    pub min_label_score: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            protocol: Protocol::VideoData,
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            min_label_score: DEFAULT_MIN_LABEL_SCORE,
        }
    }
}

impl ResolverConfig {
    /// Load using $RESOLVER_CONFIG_PATH, else `config/resolver.toml`, else defaults.
    /// Env overrides are applied last.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let path = PathBuf::from(p);
                if !path.exists() {
                    return Err(anyhow!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        path.display()
                    ));
                }
                Self::load_from_file(&path)?
            }
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(|k| env::var(k).ok());
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading resolver config from {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("parsing resolver config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: ResolverConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Apply env-style overrides from `get` (tests pass a map instead of the process env).
    pub fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("CATALOG_ITEMS_URL") {
            self.catalogs.items_url = v;
        }
        if let Some(v) = get("CATALOG_SOURCES_URL") {
            self.catalogs.sources_url = v;
        }
        if let Some(v) = get("CLASSIFIER_URL") {
            self.classifier.url = v;
        }
        if let Some(v) = get("CACHE_DIR") {
            self.cache.dir = v;
        }
        if let Some(ttl) = get("CACHE_TTL_SECS").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.cache.ttl_secs = ttl;
        }
    }

    fn sanitize(&mut self) {
        if self.cache.ttl_secs == 0 {
            self.cache.ttl_secs = DEFAULT_TTL_SECS;
        }
        if self.classifier.timeout_secs == 0 {
            self.classifier.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.catalogs.fetch_timeout_secs == 0 {
            self.catalogs.fetch_timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if !(0.0..=1.0).contains(&self.classifier.min_label_score) {
            self.classifier.min_label_score = DEFAULT_MIN_LABEL_SCORE;
        }
        self.classifier.url = self.classifier.url.trim().to_string();
        if self.api.max_batch_items == 0 {
            self.api.max_batch_items = DEFAULT_MAX_BATCH_ITEMS;
        }
        if self.api.batch_concurrency == 0 {
            self.api.batch_concurrency = DEFAULT_BATCH_CONCURRENCY;
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.catalogs.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.catalogs.refresh_secs > 0).then(|| Duration::from_secs(self.catalogs.refresh_secs))
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the bearer token. "ENV" reads CLASSIFIER_API_KEY and fails if unset.
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        let raw = self.api_key.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.eq_ignore_ascii_case("env") {
            let key = env::var("CLASSIFIER_API_KEY")
                .map_err(|_| anyhow!("Missing CLASSIFIER_API_KEY env var"))?;
            return Ok(Some(key));
        }
        Ok(Some(raw.to_string()))
    }
}
