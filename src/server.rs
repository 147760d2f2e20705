//! Dashboard HTTP server.
//!
//! Endpoints:
//!   GET /                 - dashboard page
//!   GET /api/results      - loaded channels as JSON
//!   GET /api/summary      - glucose metrics (all null when no data)
//!   GET /api/manifest     - container details: hash, keys, resolved aliases
//!   GET /api/health       - health check
//!   GET /results/{name}   - allow-listed plot/archive files from the results dir

use anyhow::Context;
use axum::extract::{Path as UrlPath, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::analysis::{GlucoseAnalyzer, MetricsReport};
use crate::config::DashboardConfig;
use crate::data::{ResultsManifest, SeriesLoader};
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};
use crate::series::SimulationResults;

const INDEX_HTML: &str = include_str!("../templates/index.html");

pub struct AppState {
    pub cfg: DashboardConfig,
    pub loader: SeriesLoader,
    pub analyzer: GlucoseAnalyzer,
}

impl AppState {
    pub fn new(cfg: DashboardConfig) -> Self {
        Self {
            loader: SeriesLoader::new(cfg.results_file.clone()),
            analyzer: GlucoseAnalyzer::new(cfg.analysis),
            cfg,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("not found: {}", what)),
            ApiError::Internal(err) => {
                let msg = format!("{:#}", err);
                log(
                    Level::Error,
                    Domain::Http,
                    "request.failed",
                    obj(&[("msg", v_str(&msg))]),
                );
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

// =============================================================================
// Router
// =============================================================================

pub fn router(cfg: DashboardConfig) -> Router {
    router_with_state(Arc::new(AppState::new(cfg)))
}

pub fn router_with_state(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/results", get(api_results))
        .route("/api/summary", get(api_summary))
        .route("/api/manifest", get(api_manifest))
        .route("/api/health", get(health))
        .route("/results/{name}", get(results_file))
        .fallback(not_found)
        .layer(middleware::map_response(allow_any_origin))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

pub async fn serve(cfg: DashboardConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    let addr = listener.local_addr()?;

    log(
        Level::Info,
        Domain::System,
        "server.start",
        obj(&[
            ("msg", v_str(&format!("dashboard at http://{}", addr))),
            ("results_file", v_str(&cfg.results_file.display().to_string())),
            ("results_dir", v_str(&cfg.results_dir.display().to_string())),
            ("served_files", json!(cfg.served_files)),
            ("analysis", json!(cfg.analysis)),
        ]),
    );

    axum::serve(listener, router(cfg))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log(Level::Info, Domain::System, "server.stop", obj(&[]));
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log(
            Level::Warn,
            Domain::System,
            "signal.error",
            obj(&[("msg", v_str(&err.to_string()))]),
        );
    }
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn trace_request(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let _scope = ProfileScope::with_context("request", &[("path", v_str(&path))]);
    let response = next.run(req).await;
    log(
        Level::Debug,
        Domain::Http,
        "request",
        obj(&[
            ("path", v_str(&path)),
            ("status", json!(response.status().as_u16())),
        ]),
    );
    response
}

// =============================================================================
// Handlers
// =============================================================================

async fn load(state: &AppState) -> Result<SimulationResults, ApiError> {
    let loader = state.loader.clone();
    let results = tokio::task::spawn_blocking(move || loader.load())
        .await
        .context("results loader task failed")??;
    Ok(results)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SimulationResults>, ApiError> {
    Ok(Json(load(&state).await?))
}

async fn api_summary(State(state): State<Arc<AppState>>) -> Result<Json<MetricsReport>, ApiError> {
    let results = load(&state).await?;
    let report = state.analyzer.analyze_series(&results.time_series());
    if !report.is_available() {
        log(
            Level::Debug,
            Domain::Analysis,
            "summary.unavailable",
            obj(&[("samples", json!(results.glucose.len()))]),
        );
    }
    Ok(Json(report))
}

async fn api_manifest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultsManifest>, ApiError> {
    let loader = state.loader.clone();
    let manifest = tokio::task::spawn_blocking(move || loader.manifest())
        .await
        .context("manifest task failed")??;
    Ok(Json(manifest))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn results_file(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Response, ApiError> {
    if !state.cfg.is_served(&name) {
        return Err(ApiError::NotFound(name));
    }
    let path = state.cfg.results_dir.join(&name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(name));
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("reading {}", path.display()))
                .into())
        }
    };

    let content_type = content_type_for(&name);
    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if content_type == "application/zip" {
        if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            headers.insert(header::CONTENT_DISPOSITION, v);
        }
    }
    Ok(response)
}

async fn not_found(req: Request) -> ApiError {
    ApiError::NotFound(req.uri().path().to_string())
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}
