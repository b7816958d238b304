//! HTTP routes.
//!
//! - POST /embed          `{"text"}` -> `{"embedding": [...]}`
//! - GET  /health         liveness text (also served at /test)
//! - GET  /neighbors/{key} precomputed neighbors of one item
//! - POST /search-images  `{"keyword"}` -> best label and up to 10 paths
//! - GET  /index_data/*    build output files (metadata.json, neighbors.json)
//! - GET  /corpus/*        image files under the corpus root

use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use imgsim_embed::Embedder;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::catalog::{Catalog, SEARCH_LIMIT};
use crate::error::{ApiError, ServiceError};

pub const DEFAULT_ADDR: &str = ":5001";
pub const HEALTH_MESSAGE: &str = "Server is up and running!";
/// Mount point of the build output directory.
pub const ARTIFACTS_ROUTE: &str = "/index_data";
/// Mount point of the corpus root.
pub const CORPUS_ROUTE: &str = "/corpus";

/// Shared handler state. The embedder is constructed once at startup and
/// shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub catalog: Option<Arc<Catalog>>,
    pub artifacts_dir: Option<PathBuf>,
    pub corpus_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            catalog: None,
            artifacts_dir: None,
            corpus_dir: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Serves the files of a build output directory under [`ARTIFACTS_ROUTE`].
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    /// Serves the corpus images under [`CORPUS_ROUTE`] and adds their URLs
    /// to keyword search results.
    pub fn with_corpus_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.corpus_dir = Some(dir.into());
        self
    }
}

pub fn router(state: AppState) -> Router {
    let mut app: Router<AppState> = Router::new()
        .route("/embed", post(embed))
        .route("/health", get(health))
        .route("/test", get(health))
        .route("/neighbors/{*key}", get(neighbors))
        .route("/search-images", post(search_images));

    if let Some(dir) = &state.artifacts_dir {
        app = app.nest_service(ARTIFACTS_ROUTE, ServeDir::new(dir));
    }
    if let Some(dir) = &state.corpus_dir {
        app = app.nest_service(CORPUS_ROUTE, ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Parse address string to SocketAddr. A bare `:port` binds all interfaces.
pub fn parse_addr(addr: &str) -> Result<SocketAddr, ServiceError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.parse().map_err(|e: std::net::AddrParseError| ServiceError::InvalidAddr {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> Result<(), ServiceError> {
    let addr = parse_addr(addr)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::Io(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ServiceError::Io(e.to_string()))
}

/// A string field of a JSON object body. Anything else, including a body
/// that is not JSON at all, yields `None`.
fn string_field(body: &[u8], field: &str) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    v.get(field)?.as_str().map(str::to_string)
}

/// URL under [`CORPUS_ROUTE`] for an item path inside `root`.
fn corpus_url(root: &FsPath, path: &str) -> Option<String> {
    let rel = FsPath::new(path).strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| format!("{CORPUS_ROUTE}/{}", parts.join("/")))
}

fn catalog(state: &AppState) -> Result<&Catalog, ApiError> {
    state
        .catalog
        .as_deref()
        .ok_or_else(|| ApiError::not_found("No catalog loaded"))
}

async fn embed(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let text = string_field(&body, "text").ok_or_else(|| ApiError::bad_request("No text provided"))?;
    let embedding = state.embedder.embed(&text).await.map_err(|e| {
        tracing::error!(error = %e, "embedding failed");
        ApiError::internal(e.to_string())
    })?;
    Ok(Json(json!({ "embedding": embedding })))
}

async fn health() -> &'static str {
    HEALTH_MESSAGE
}

async fn neighbors(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let list = catalog(&state)?
        .neighbors(&key)
        .ok_or_else(|| ApiError::not_found(format!("No neighbors for \"{key}\"")))?;
    Ok(Json(json!({ "key": key, "neighbors": list })))
}

async fn search_images(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let keyword = string_field(&body, "keyword")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("No keyword provided"))?;
    let hit = catalog(&state)?
        .search(&keyword, SEARCH_LIMIT)
        .filter(|h| !h.paths.is_empty())
        .ok_or_else(|| ApiError::not_found(format!("No images found for label \"{keyword}\"")))?;
    tracing::info!(keyword = %keyword, label = hit.label, score = hit.score, "keyword search");
    let mut body = json!({ "label": hit.label, "results": hit.paths });
    if let Some(root) = &state.corpus_dir {
        let urls: Vec<Option<String>> = hit.paths.iter().map(|p| corpus_url(root, p)).collect();
        body["urls"] = json!(urls);
    }
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use imgsim_embed::{EmbedError, HashEmbedder, HASH_TEXT_DIM};
    use reqwest::StatusCode;

    use super::*;

    async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await.unwrap() });
        format!("http://{addr}")
    }

    fn hash_state() -> AppState {
        AppState::new(Arc::new(HashEmbedder::new(HASH_TEXT_DIM)))
    }

    async fn post_json(url: &str, body: Value) -> (StatusCode, Value) {
        let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    struct Broken;

    #[async_trait::async_trait]
    impl Embedder for Broken {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Api("model unavailable".into()))
        }

        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Api("model unavailable".into()))
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_parse_addr() {
        assert_eq!(
            parse_addr(":5001").unwrap(),
            "0.0.0.0:5001".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_addr("127.0.0.1:80").unwrap().port(), 80);
        assert!(matches!(
            parse_addr("localhost"),
            Err(ServiceError::InvalidAddr { .. })
        ));
    }

    #[tokio::test]
    async fn test_embed_is_deterministic() {
        let base = spawn(hash_state()).await;
        let url = format!("{base}/embed");

        let (s1, a) = post_json(&url, json!({ "text": "hello" })).await;
        let (s2, b) = post_json(&url, json!({ "text": "hello" })).await;
        assert_eq!(s1, StatusCode::OK);
        assert_eq!(s2, StatusCode::OK);
        assert_eq!(a, b);
        assert_eq!(a["embedding"].as_array().unwrap().len(), HASH_TEXT_DIM);

        let (_, c) = post_json(&url, json!({ "text": "a different sentence" })).await;
        assert_ne!(a["embedding"], c["embedding"]);
    }

    #[tokio::test]
    async fn test_embed_bad_requests_then_keeps_serving() {
        let base = spawn(hash_state()).await;
        let url = format!("{base}/embed");
        let no_text = json!({ "error": "No text provided" });

        for body in [json!({}), json!({ "text": null }), json!({ "text": 42 }), json!([1, 2])] {
            let (status, v) = post_json(&url, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(v, no_text);
        }

        let resp = reqwest::Client::new()
            .post(&url)
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = reqwest::Client::new().post(&url).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (status, _) = post_json(&url, json!({ "text": "still alive" })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_embed_empty_text() {
        let base = spawn(hash_state()).await;
        let url = format!("{base}/embed");

        let (s1, a) = post_json(&url, json!({ "text": "" })).await;
        let (s2, b) = post_json(&url, json!({ "text": "" })).await;
        assert_eq!(s1, StatusCode::OK);
        assert_eq!(s2, StatusCode::OK);
        assert_eq!(a["embedding"].as_array().unwrap().len(), HASH_TEXT_DIM);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_embed_failure_is_500() {
        let base = spawn(AppState::new(Arc::new(Broken))).await;
        let (status, v) = post_json(&format!("{base}/embed"), json!({ "text": "hi" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(v["error"].as_str().unwrap().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(hash_state()).await;
        for path in ["/health", "/test"] {
            let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.text().await.unwrap(), HEALTH_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_neighbors_route() {
        let base = spawn(hash_state().with_catalog(crate::catalog::tests::sample())).await;

        let resp = reqwest::get(format!("{base}/neighbors/n01443537_0.JPEG"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v: Value = resp.json().await.unwrap();
        assert_eq!(v["key"], "n01443537_0.JPEG");
        assert_eq!(v["neighbors"], json!(["n01443537_1.JPEG", "n01443537_2.JPEG"]));

        let resp = reqwest::get(format!("{base}/neighbors/nope.JPEG")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_routes_without_catalog() {
        let base = spawn(hash_state()).await;
        let resp = reqwest::get(format!("{base}/neighbors/a.JPEG")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let (status, _) =
            post_json(&format!("{base}/search-images"), json!({ "keyword": "fish" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_corpus_url() {
        let root = FsPath::new("data/train");
        assert_eq!(
            corpus_url(root, "data/train/n01/images/a.JPEG").as_deref(),
            Some("/corpus/n01/images/a.JPEG")
        );
        assert_eq!(corpus_url(root, "elsewhere/a.JPEG"), None);
        assert_eq!(corpus_url(root, "data/train"), None);
    }

    #[tokio::test]
    async fn test_static_artifacts_and_corpus() {
        let out = tempfile::tempdir().unwrap();
        std::fs::write(out.path().join("metadata.json"), "[]\n").unwrap();
        let corpus = tempfile::tempdir().unwrap();
        let images = corpus.path().join("n01").join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("a.JPEG"), b"jpeg bytes").unwrap();

        let state = hash_state()
            .with_artifacts_dir(out.path())
            .with_corpus_dir(corpus.path());
        let base = spawn(state).await;

        let resp = reqwest::get(format!("{base}/index_data/metadata.json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.json::<Value>().await.unwrap(), json!([]));

        let resp = reqwest::get(format!("{base}/corpus/n01/images/a.JPEG"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&resp.bytes().await.unwrap()[..], b"jpeg bytes");

        let resp = reqwest::get(format!("{base}/index_data/missing.json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_routes_off_by_default() {
        let base = spawn(hash_state()).await;
        let resp = reqwest::get(format!("{base}/index_data/metadata.json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_images_urls() {
        let state = hash_state()
            .with_catalog(crate::catalog::tests::sample())
            .with_corpus_dir("train");
        let base = spawn(state).await;

        let (status, v) =
            post_json(&format!("{base}/search-images"), json!({ "keyword": "bullfrog" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            v["urls"],
            json!([
                "/corpus/n01641577/images/n01641577_0.JPEG",
                "/corpus/n01641577/images/n01641577_1.JPEG"
            ])
        );
    }

    #[tokio::test]
    async fn test_search_images() {
        let base = spawn(hash_state().with_catalog(crate::catalog::tests::sample())).await;
        let url = format!("{base}/search-images");

        let (status, v) = post_json(&url, json!({ "keyword": "goldfish" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["label"], "goldfish, Carassius auratus");
        assert_eq!(v["results"].as_array().unwrap().len(), 10);
        assert!(v.get("urls").is_none());

        let (status, v) = post_json(&url, json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v, json!({ "error": "No keyword provided" }));

        let (status, v) = post_json(&url, json!({ "keyword": "%%%" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(v["error"].as_str().unwrap().starts_with("No images found"));
    }
}
