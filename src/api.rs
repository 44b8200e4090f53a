//! HTTP surface for the scraper/UI layer: resolve one or many items, reload
//! catalogs, inspect the current snapshot.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::cascade::{Resolution, ResolutionCascade, Tier};
use crate::catalog::CatalogLoadReport;
use crate::config::DEFAULT_MAX_BATCH_ITEMS;
use crate::model::{Classification, Item};

pub const TIER_HEADER: &str = "x-resolution-tier";

#[derive(Clone)]
pub struct AppState {
    pub cascade: ResolutionCascade,
    pub max_batch_items: usize,
}

impl AppState {
    pub fn new(cascade: ResolutionCascade) -> Self {
        Self {
            cascade,
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
        }
    }

    pub fn with_max_batch_items(mut self, max: usize) -> Self {
        self.max_batch_items = max;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/resolve", post(resolve))
        .route("/resolve/batch", post(resolve_batch))
        .route("/admin/reload-catalogs", post(reload_catalogs))
        .route("/debug/catalogs", get(debug_catalogs))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Either the extension message shape `{ "videoData": {...} }` or a bare item.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResolveReq {
    Wrapped {
        #[serde(rename = "videoData")]
        video_data: Item,
    },
    Bare(Item),
}

impl ResolveReq {
    fn into_item(self) -> Item {
        match self {
            ResolveReq::Wrapped { video_data } => video_data,
            ResolveReq::Bare(item) => item,
        }
    }
}

/// Result message keyed by the item id.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    video_id: String,
    analysis: Classification,
    tier: Tier,
}

impl AnalysisMessage {
    fn new(id: String, r: Resolution) -> Self {
        Self {
            kind: "analysis_result",
            video_id: id,
            analysis: r.classification,
            tier: r.tier,
        }
    }
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

fn invalid(msg: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiError {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

async fn resolve(State(state): State<AppState>, Json(body): Json<ResolveReq>) -> Response {
    let item = body.into_item();
    if item.id.trim().is_empty() {
        return invalid("item id must not be empty");
    }
    let resolution = state.cascade.resolve(&item).await;
    let tier = resolution.tier.as_str();
    (
        [(TIER_HEADER, tier)],
        Json(AnalysisMessage::new(item.id, resolution)),
    )
        .into_response()
}

async fn resolve_batch(
    State(state): State<AppState>,
    Json(body): Json<Vec<ResolveReq>>,
) -> Response {
    if body.len() > state.max_batch_items {
        return invalid(&format!(
            "batch of {} items exceeds the limit of {}",
            body.len(),
            state.max_batch_items
        ));
    }
    let items: Vec<Item> = body.into_iter().map(ResolveReq::into_item).collect();
    if items.iter().any(|it| it.id.trim().is_empty()) {
        return invalid("every item needs a non-empty id");
    }
    let ids: Vec<String> = items.iter().map(|it| it.id.clone()).collect();
    let resolutions = state.cascade.resolve_many(items).await;
    let out: Vec<AnalysisMessage> = ids
        .into_iter()
        .zip(resolutions)
        .map(|(id, r)| AnalysisMessage::new(id, r))
        .collect();
    Json(out).into_response()
}

async fn reload_catalogs(State(state): State<AppState>) -> Json<CatalogLoadReport> {
    let report = state.cascade.catalogs().reload().await;
    info!(
        target: "catalog",
        generation = report.generation,
        failures = report.failures.len(),
        "manual catalog reload"
    );
    Json(report)
}

#[derive(Serialize)]
struct CatalogStatus {
    generation: u64,
    items: usize,
    sources: usize,
    loaded_at: Option<DateTime<Utc>>,
    cache_store: &'static str,
    cache_ttl_secs: u64,
    classifier: &'static str,
}

async fn debug_catalogs(State(state): State<AppState>) -> Json<CatalogStatus> {
    let cascade = &state.cascade;
    let snap = cascade.catalogs().snapshot();
    Json(CatalogStatus {
        generation: cascade.catalogs().generation(),
        items: snap.item_count(),
        sources: snap.source_count(),
        loaded_at: snap.loaded_at(),
        cache_store: cascade.cache().store_name(),
        cache_ttl_secs: cascade.cache().ttl().as_secs(),
        classifier: cascade.classifier_name(),
    })
}
