//! Router tests: requests go through the full middleware stack via `oneshot`.

use apdash::config::DashboardConfig;
use apdash::server::router;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;
use tower::ServiceExt;

fn config_in(dir: &TempDir) -> DashboardConfig {
    DashboardConfig {
        results_file: dir.path().join("latest_results.json"),
        results_dir: dir.path().join("results"),
        ..DashboardConfig::default()
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn summary_is_all_null_without_results() {
    let dir = TempDir::new().unwrap();
    let (status, v) = get_json(router(config_in(&dir)), "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    let obj = v.as_object().unwrap();
    assert_eq!(obj.len(), 11);
    assert!(obj.values().all(|f| f.is_null()));
}

#[tokio::test]
async fn results_are_empty_without_file() {
    let dir = TempDir::new().unwrap();
    let (status, v) = get_json(router(config_in(&dir)), "/api/results").await;
    assert_eq!(status, StatusCode::OK);
    for key in ["t", "glucose", "insulin", "insulin_input", "meal", "target", "error"] {
        assert_eq!(v[key], Value::Array(vec![]), "channel {}", key);
    }
}

#[tokio::test]
async fn summary_from_stored_results() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir);
    fs::write(
        &cfg.results_file,
        r#"{"t_vec": [0, 5, 10], "g_vec": [50, 250, 50], "G_target_vec": [120, 120, 120]}"#,
    )
    .unwrap();

    let app = router(cfg);
    let (status, v) = get_json(app.clone(), "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["hypo_episodes"], 2);
    assert_eq!(v["hyper_episodes"], 1);
    assert_eq!(v["time_in_range_pct"], 0.0);
    // Baseline stays at 100 mg/dL regardless of the stored target channel.
    assert_eq!(v["iae"], 5.0 * (50.0 + 150.0 + 50.0));

    let (status, v) = get_json(app, "/api/results").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["glucose"], serde_json::json!([50.0, 250.0, 50.0]));
    assert_eq!(v["target"], serde_json::json!([120.0, 120.0, 120.0]));
}

#[tokio::test]
async fn corrupt_results_surface_as_server_error() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir);
    fs::write(&cfg.results_file, "not json").unwrap();
    let (status, v) = get_json(router(cfg), "/api/summary").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(v["error"].as_str().unwrap().contains("latest_results.json"));
}

#[tokio::test]
async fn manifest_and_health() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir);
    fs::write(&cfg.results_file, r#"{"t_vec": [0], "glucose": [120]}"#).unwrap();
    let app = router(cfg);

    let (status, v) = get_json(app.clone(), "/api/manifest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["exists"], true);
    assert_eq!(v["format"], "json");

    let (status, v) = get_json(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "ok");
}

#[tokio::test]
async fn index_page_and_cors_header() {
    let dir = TempDir::new().unwrap();
    let (status, headers, body) = get(router(config_in(&dir)), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(String::from_utf8(body).unwrap().contains("/api/summary"));
}

#[tokio::test]
async fn serves_only_allow_listed_files() {
    let dir = TempDir::new().unwrap();
    let cfg = config_in(&dir);
    fs::create_dir_all(&cfg.results_dir).unwrap();
    fs::write(cfg.results_dir.join("glucose.png"), b"\x89PNG").unwrap();
    fs::write(cfg.results_dir.join("results.zip"), b"PK").unwrap();
    fs::write(cfg.results_dir.join("notes.txt"), b"private").unwrap();
    let app = router(cfg);

    let (status, headers, body) = get(app.clone(), "/results/glucose.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(body, b"\x89PNG");

    let (status, headers, _) = get(app.clone(), "/results/results.zip").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    assert!(headers.contains_key(header::CONTENT_DISPOSITION));

    let (status, _, _) = get(app.clone(), "/results/notes.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Allow-listed but not produced by this run.
    let (status, _, _) = get(app.clone(), "/results/meal.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(app, "/results/..%2Flatest_results.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (status, v) = get_json(router(config_in(&dir)), "/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(v["error"].is_string());
}
