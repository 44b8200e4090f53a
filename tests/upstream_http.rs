// tests/upstream_http.rs
//
// HTTP classifier and HTTP catalog source against throwaway local axum servers.

use std::time::Duration;

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use ytruth_resolver::catalog::{CatalogHalf, CatalogLoadFailure, CatalogSource, Catalogs, HttpCatalogSource};
use ytruth_resolver::classifier::{Classifier, ClassifierFailure, HttpClassifier};
use ytruth_resolver::config::{ClassifierConfig, Protocol, ResolverConfig};
use ytruth_resolver::{EditorialBias, Factuality, Item, PoliticalLeaning};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn classifier_cfg(url: String) -> ClassifierConfig {
    ClassifierConfig {
        url,
        timeout_secs: 2,
        ..ClassifierConfig::default()
    }
}

fn item() -> Item {
    Item::new("abc123", "Some Channel", "Budget vote tonight")
}

#[tokio::test]
async fn video_data_protocol_maps_ranked_labels() {
    let app = Router::new().route(
        "/analyze",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["videoData"]["id"], "abc123");
            assert_eq!(body["videoData"]["channel"], "Some Channel");
            Json(json!({
                "labels": ["Entertainment", "News", "Political", "Mixed"],
                "scores": [0.71, 0.64, 0.58, 0.40]
            }))
        }),
    );
    let base = serve(app).await;

    let c = HttpClassifier::new(&classifier_cfg(format!("{base}/analyze"))).unwrap();
    let out = c.classify(&item()).await.unwrap();
    assert_eq!(out.editorial_bias(), EditorialBias::News);
    assert_eq!(out.political_leaning(), PoliticalLeaning::Political);
    assert_eq!(out.factuality(), Factuality::Mixed);
    assert!(out.tooltip().contains("Political Leaning: Political"));
}

/// Zero-shot inference response: every candidate label, ranked, scores summing to ~1.
fn zero_shot_ranking(inputs: &str) -> Value {
    let ranked: [(&str, f32); 10] = if inputs.contains("hoax") {
        [
            ("Entertainment", 0.34),
            ("Conspiracy/Pseudoscience", 0.21),
            ("Low", 0.14),
            ("Non-Political", 0.11),
            ("Opinion/Commentary", 0.06),
            ("Mixed", 0.04),
            ("High", 0.03),
            ("Political", 0.03),
            ("News", 0.02),
            ("Educational/Instructional", 0.02),
        ]
    } else {
        [
            ("High", 0.30),
            ("Political", 0.22),
            ("News", 0.18),
            ("Mixed", 0.08),
            ("Low", 0.05),
            ("Non-Political", 0.05),
            ("Opinion/Commentary", 0.04),
            ("Educational/Instructional", 0.03),
            ("Conspiracy/Pseudoscience", 0.03),
            ("Entertainment", 0.02),
        ]
    };
    json!({
        "sequence": inputs,
        "labels": ranked.iter().map(|(l, _)| *l).collect::<Vec<_>>(),
        "scores": ranked.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn zero_shot_protocol_sends_candidate_labels_and_bearer() {
    let app = Router::new().route(
        "/zs",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if auth != "Bearer sekret" {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            let inputs = body["inputs"].as_str().unwrap_or_default().to_string();
            assert_eq!(body["parameters"]["candidate_labels"].as_array().unwrap().len(), 10);
            Json(zero_shot_ranking(&inputs)).into_response()
        }),
    );
    let base = serve(app).await;

    let cfg = ClassifierConfig {
        protocol: Protocol::ZeroShot,
        api_key: "sekret".into(),
        ..classifier_cfg(format!("{base}/zs"))
    };
    let out = HttpClassifier::new(&cfg).unwrap().classify(&item()).await.unwrap();
    assert_eq!(out.factuality(), Factuality::High);
    assert_eq!(out.political_leaning(), PoliticalLeaning::Political);
    assert_eq!(out.editorial_bias(), EditorialBias::News);
}

#[tokio::test]
async fn zero_shot_result_follows_the_model_ranking() {
    let app = Router::new().route(
        "/zs",
        post(|Json(body): Json<Value>| async move {
            Json(zero_shot_ranking(body["inputs"].as_str().unwrap_or_default()))
        }),
    );
    let base = serve(app).await;

    // Shipped defaults: every candidate comes back scored, so presence is decided by score.
    let cfg = ResolverConfig::load_from_file(std::path::Path::new("config/resolver.toml"))
        .expect("shipped config parses");
    let cfg = ClassifierConfig {
        url: format!("{base}/zs"),
        api_key: String::new(),
        ..cfg.classifier
    };
    assert_eq!(cfg.protocol, Protocol::ZeroShot);
    let c = HttpClassifier::new(&cfg).unwrap();

    let news = c.classify(&item()).await.unwrap();
    let fringe = c
        .classify(&Item::new("def456", "Some Channel", "Moon landing hoax exposed"))
        .await
        .unwrap();

    assert_eq!(
        (news.factuality(), news.political_leaning(), news.editorial_bias()),
        (Factuality::High, PoliticalLeaning::Political, EditorialBias::News)
    );
    assert_eq!(
        (fringe.factuality(), fringe.political_leaning(), fringe.editorial_bias()),
        (Factuality::Low, PoliticalLeaning::NonPolitical, EditorialBias::Conspiracy)
    );
}

#[tokio::test]
async fn non_success_status_is_http_error() {
    let app = Router::new().route(
        "/analyze",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading model") }),
    );
    let base = serve(app).await;

    let c = HttpClassifier::new(&classifier_cfg(format!("{base}/analyze"))).unwrap();
    let err = c.classify(&item()).await.unwrap_err();
    assert_eq!(err, ClassifierFailure::HttpError(503));
    assert_eq!(err.to_classification().display_text(), "AI Failed");
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let app = Router::new().route("/analyze", post(|| async { "<html>nope</html>" }));
    let base = serve(app).await;

    let c = HttpClassifier::new(&classifier_cfg(format!("{base}/analyze"))).unwrap();
    let err = c.classify(&item()).await.unwrap_err();
    assert!(matches!(err, ClassifierFailure::ParseError(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let app = Router::new().route(
        "/analyze",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "labels": ["News"] }))
        }),
    );
    let base = serve(app).await;

    let cfg = ClassifierConfig {
        timeout_secs: 1,
        ..classifier_cfg(format!("{base}/analyze"))
    };
    let err = HttpClassifier::new(&cfg).unwrap().classify(&item()).await.unwrap_err();
    assert_eq!(err, ClassifierFailure::Timeout);
}

fn catalog_app(sources_status: StatusCode) -> Router {
    Router::new()
        .route(
            "/video_database.json",
            get(|| async {
                Json(json!({
                    "videos": {
                        "dQw4w9WgXcQ": {
                            "factuality": "High",
                            "politicalness": "Non-Political",
                            "editorialBias": "Entertainment"
                        }
                    }
                }))
            }),
        )
        .route(
            "/bias_database.json",
            get(move || async move {
                if sources_status.is_success() {
                    (
                        StatusCode::OK,
                        Json(json!({
                            "channels": {
                                "Daily Wire": { "politicalLeaning": "Right", "factuality": "Mixed" },
                                "Some New Outlet": { "politicalLeaning": "Sideways", "factuality": 7 }
                            }
                        })),
                    )
                } else {
                    (sources_status, Json(json!({})))
                }
            }),
        )
}

#[tokio::test]
async fn http_catalogs_load_both_documents() {
    let base = serve(catalog_app(StatusCode::OK)).await;
    let source = HttpCatalogSource::new(
        format!("{base}/video_database.json"),
        format!("{base}/bias_database.json"),
        Duration::from_secs(2),
    )
    .unwrap();

    let items = source.fetch_items().await.unwrap();
    let curated = &items["dQw4w9WgXcQ"];
    assert_eq!(curated.political_leaning(), PoliticalLeaning::NonPolitical);
    assert_eq!(curated.editorial_bias(), EditorialBias::Entertainment);

    let sources = source.fetch_sources().await.unwrap();
    assert_eq!(sources["Daily Wire"].political_leaning, PoliticalLeaning::Right);
    assert_eq!(sources["Some New Outlet"].political_leaning, PoliticalLeaning::Unknown);
    assert_eq!(sources["Some New Outlet"].factuality, Factuality::Unknown);
}

#[tokio::test]
async fn one_failed_document_leaves_the_other_usable() {
    let base = serve(catalog_app(StatusCode::NOT_FOUND)).await;
    let source = HttpCatalogSource::new(
        format!("{base}/video_database.json"),
        format!("{base}/bias_database.json"),
        Duration::from_secs(2),
    )
    .unwrap();
    let catalogs = Catalogs::new(std::sync::Arc::new(source));

    let report = catalogs.ensure_loaded().await.unwrap();
    assert_eq!(report.items, 1);
    assert_eq!(report.sources, 0);
    assert_eq!(
        report.failures,
        vec![CatalogLoadFailure::Http {
            half: CatalogHalf::Sources,
            status: 404
        }]
    );
    assert!(catalogs.lookup_item("dQw4w9WgXcQ").is_some());
    assert!(catalogs.lookup_source("Daily Wire").is_none());
}

#[tokio::test]
async fn unreachable_catalog_host_is_transport_failure() {
    let source = HttpCatalogSource::new(
        "http://127.0.0.1:9/video_database.json",
        "http://127.0.0.1:9/bias_database.json",
        Duration::from_secs(2),
    )
    .unwrap();
    let err = source.fetch_items().await.unwrap_err();
    assert!(
        matches!(err, CatalogLoadFailure::Transport { half: CatalogHalf::Items, .. }),
        "got {err:?}"
    );
}
