use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use engine::{can_handle, DocumentAnalysis, DocumentScorer, DomainAnalyzer, DomainResult};
use scanner::load_keywords;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Semaphore;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_SNAPSHOTS_CAP: usize = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub domains: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
    #[serde(default)]
    pub use_default_keywords: bool,
}
fn default_max_snapshots() -> usize { 10 }

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub results: Vec<DomainResult>,
    pub took_s: f64,
}

#[derive(Deserialize)]
pub struct CanHandleParams {
    #[serde(default)]
    pub target: String,
}

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<DomainAnalyzer>,
    pub api_token: Option<String>,
    /// Single permit: requests share one archive, so analyses run one after another.
    archive_gate: Arc<Semaphore>,
}

impl AppState {
    pub fn new(analyzer: DomainAnalyzer, api_token: Option<String>) -> Self {
        Self { analyzer: Arc::new(analyzer), api_token, archive_gate: Arc::new(Semaphore::new(1)) }
    }
}

/// Scores on the current worker via `block_in_place` on a multi-threaded
/// runtime, so parsing a large capture doesn't stall other requests.
pub struct BlockingScorer<S> {
    inner: S,
}

impl<S> BlockingScorer<S> {
    pub fn new(inner: S) -> Self { Self { inner } }

    pub fn inner(&self) -> &S { &self.inner }
}

impl<S: DocumentScorer> DocumentScorer for BlockingScorer<S> {
    fn score_document(&self, html: &str, keywords: &[String], exclude_token: &str) -> Result<DocumentAnalysis> {
        let score = || self.inner.score_document(html, keywords, exclude_token);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(score),
            _ => score(),
        }
    }
}

/// Router with `API_TOKEN` and `CORS_ALLOW_ORIGIN` taken from the environment.
pub fn build_app(analyzer: DomainAnalyzer) -> Result<Router> {
    let api_token = std::env::var("API_TOKEN").ok().filter(|t| !t.is_empty());
    let state = AppState::new(analyzer, api_token);

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };
    Ok(routes(state).layer(cors))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/can-handle", get(can_handle_handler))
        .route("/analyze", post(analyze_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn can_handle_handler(Query(params): Query<CanHandleParams>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "target": params.target, "canHandle": can_handle(&params.target) }))
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    if !req.domains.iter().any(|d| can_handle(d)) {
        return Err((StatusCode::BAD_REQUEST, "no domains given".into()));
    }
    let keywords = load_keywords(&req.keywords, None, req.use_default_keywords)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let max_snapshots = req.max_snapshots.clamp(1, MAX_SNAPSHOTS_CAP);

    let start = std::time::Instant::now();
    let _turn = state
        .archive_gate
        .acquire()
        .await
        .map_err(|_| (StatusCode::SERVICE_UNAVAILABLE, "analyzer unavailable".to_string()))?;
    tracing::info!(
        domains = req.domains.len(),
        keywords = keywords.len(),
        max_snapshots,
        queued_ms = start.elapsed().as_millis() as u64,
        "analyze request"
    );
    let results = state.analyzer.analyze_domains(&req.domains, &keywords, max_snapshots, None).await;
    Ok(Json(AnalyzeResponse { results, took_s: start.elapsed().as_secs_f64() }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let Some(required) = &state.api_token else { return Ok(()) };
    let provided = headers.get("X-API-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid api token".into()))
    }
}
