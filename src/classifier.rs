//! Remote classifier: one POST to an inference endpoint, bounded by a timeout,
//! normalized through the label priority tables.
//!
//! Every failure is returned as a tagged `ClassifierFailure`, never a panic.
//! `ClassifierFailure::to_classification` gives the renderable "AI Failed" value.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ClassifierConfig, Protocol};
use crate::labels::{classify_labels, ScoredLabel};
use crate::model::{Classification, Item};

/// Candidate labels offered to a zero-shot model.
pub const CANDIDATE_LABELS: [&str; 10] = [
    "High",
    "Mixed",
    "Low",
    "Political",
    "Non-Political",
    "News",
    "Opinion/Commentary",
    "Educational/Instructional",
    "Conspiracy/Pseudoscience",
    "Entertainment",
];

/// A zero-shot model scores every candidate; a label counts as present only
/// above an even share of the probability mass.
pub const DEFAULT_MIN_LABEL_SCORE: f32 = 1.0 / CANDIDATE_LABELS.len() as f32;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ClassifierFailure {
    #[error("classifier timed out")]
    Timeout,
    #[error("classifier returned HTTP {0}")]
    HttpError(u16),
    #[error("classifier response unreadable: {0}")]
    ParseError(String),
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier disabled")]
    Disabled,
}

impl ClassifierFailure {
    /// Stable tag for logs and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HttpError(_) => "http_error",
            Self::ParseError(_) => "parse_error",
            Self::Transport(_) => "transport",
            Self::Disabled => "disabled",
        }
    }

    pub fn to_classification(&self) -> Classification {
        Classification::failed(self.reason())
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, item: &Item) -> Result<Classification, ClassifierFailure>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;

/// Response body: parallel `labels`/`scores` arrays, ranked by the endpoint.
#[derive(Debug, Deserialize)]
pub struct LabelResponse {
    pub labels: Vec<String>,
    #[serde(default)]
    pub scores: Vec<f32>,
}

impl LabelResponse {
    pub fn into_scored(self) -> Vec<ScoredLabel> {
        let scores = self.scores;
        self.labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| ScoredLabel::new(label, scores.get(i).copied()))
            .collect()
    }
}

/* ----------------------------
HTTP classifier
---------------------------- */

pub struct HttpClassifier {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    protocol: Protocol,
    timeout: Duration,
    min_label_score: f32,
}

impl HttpClassifier {
    pub fn new(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ytruth-resolver/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(cfg.timeout())
            .build()?;
        Ok(Self {
            http,
            url: cfg.url.clone(),
            api_key: cfg.resolved_api_key()?,
            protocol: cfg.protocol,
            timeout: cfg.timeout(),
            min_label_score: cfg.min_label_score,
        })
    }

    pub fn request_body(&self, item: &Item) -> serde_json::Value {
        match self.protocol {
            Protocol::VideoData => json!({
                "videoData": {
                    "id": item.id,
                    "channel": item.channel,
                    "title": item.title,
                }
            }),
            Protocol::ZeroShot => json!({
                "inputs": zero_shot_prompt(item),
                "parameters": { "candidate_labels": CANDIDATE_LABELS },
            }),
        }
    }

    async fn call(&self, item: &Item) -> Result<Classification, ClassifierFailure> {
        let mut req = self.http.post(&self.url).json(&self.request_body(item));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(map_reqwest_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClassifierFailure::HttpError(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
        let body: LabelResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ClassifierFailure::ParseError(e.to_string()))?;
        debug!(target: "classifier", labels = body.labels.len(), "classifier responded");
        Ok(classify_labels(&body.into_scored(), self.min_label_score))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClassifierFailure {
    if e.is_timeout() {
        ClassifierFailure::Timeout
    } else {
        ClassifierFailure::Transport(e.to_string())
    }
}

fn zero_shot_prompt(item: &Item) -> String {
    format!(
        "Video \"{}\" published by \"{}\". Classify its factuality, whether it is political, and its editorial intent.",
        item.title, item.channel
    )
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, item: &Item) -> Result<Classification, ClassifierFailure> {
        match tokio::time::timeout(self.timeout, self.call(item)).await {
            Ok(res) => res,
            Err(_) => Err(ClassifierFailure::Timeout),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/* ----------------------------
Mock / disabled
---------------------------- */

/// Deterministic classifier for tests/local runs; same labels for every item.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    pub labels: Vec<ScoredLabel>,
    pub min_label_score: f32,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self {
            labels: vec![
                ScoredLabel::new("News", Some(0.62)),
                ScoredLabel::new("Political", Some(0.55)),
                ScoredLabel::new("High", Some(0.48)),
            ],
            min_label_score: 0.0,
        }
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, _item: &Item) -> Result<Classification, ClassifierFailure> {
        Ok(classify_labels(&self.labels, self.min_label_score))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails with `Disabled`; used when no endpoint is configured.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _item: &Item) -> Result<Classification, ClassifierFailure> {
        Err(ClassifierFailure::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Factory:
/// * `AI_TEST_MODE=mock` → `MockClassifier`
/// * disabled or empty URL → `DisabledClassifier`
/// * otherwise → `HttpClassifier`, or `DisabledClassifier` if it cannot be
///   built (e.g. `api_key = "ENV"` with no key in the environment)
pub fn build_classifier(cfg: &ClassifierConfig) -> DynClassifier {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockClassifier {
            min_label_score: cfg.min_label_score,
            ..Default::default()
        });
    }
    if !cfg.enabled || cfg.url.is_empty() {
        return Arc::new(DisabledClassifier);
    }
    match HttpClassifier::new(cfg) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!(target: "classifier", error = %e, "classifier unavailable; falling back to disabled");
            Arc::new(DisabledClassifier)
        }
    }
}
