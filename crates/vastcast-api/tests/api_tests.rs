//! API integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vastcast_api::{create_router, ApiConfig, AppState, ConversionConfig, ConversionPipeline};
use vastcast_media::{EngineLocation, RenderExecutor};
use vastcast_resolver::{ClickthroughResolver, RedirectFollower, Resolution};
use vastcast_vast::{VastFetcher, DEFAULT_FETCH_TIMEOUT};

const BOUNDARY: &str = "vastcast-test-boundary";

const VAST: &str = r#"<VAST version="3.0"><Ad><InLine>
    <AdTitle>ABC_Nike_Campaign</AdTitle>
    <MediaFile type="video/mp4">https://cdn.example/ad.mp4</MediaFile>
    <ClickThrough>https://track.example/c?u=https%3A%2F%2Fnike.example%2Frun</ClickThrough>
</InLine></Ad></VAST>"#;

struct FixedFollower;

#[async_trait]
impl RedirectFollower for FixedFollower {
    async fn follow(&self, url: &str) -> Resolution {
        Resolution::Resolved(url.to_string())
    }
}

struct TestApp {
    router: Router,
    dir: TempDir,
}

impl TestApp {
    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("generated")
    }
}

fn test_app_with(engine: impl FnOnce(&TempDir) -> EngineLocation, rate_limit_rps: u32) -> TestApp {
    let dir = TempDir::new().unwrap();
    let background = dir.path().join("background.jpg");
    std::fs::write(&background, b"jpeg").unwrap();

    let conversion = ConversionConfig {
        output_dir: dir.path().join("generated"),
        background_image: background,
        ..ConversionConfig::default()
    };
    let config = ApiConfig {
        rate_limit_rps,
        conversion: conversion.clone(),
        ..ApiConfig::default()
    };

    let pipeline = ConversionPipeline::new(
        conversion,
        VastFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap(),
        ClickthroughResolver::new(Arc::new(FixedFollower)),
        RenderExecutor::new(engine(&dir)),
    );
    let router = create_router(AppState::with_pipeline(config, pipeline), None);

    TestApp { router, dir }
}

fn test_app() -> TestApp {
    test_app_with(|dir| EngineLocation::at(dir.path().join("missing-ffmpeg")), 100)
}

fn convert_request(fields: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, filename, value) in fields {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match filename {
            Some(filename) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: text/xml\r\n\r\n"
            )),
            None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("X-Forwarded-For", "203.0.113.10")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let response = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_route_absent_without_recorder() {
    let app = test_app();
    let response = app.router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = test_app();
    let request = Request::builder()
        .uri("/healthz")
        .header("X-Request-ID", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_ready_reports_missing_encoder() {
    let app = test_app();
    let response = app.router.oneshot(get("/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["encoder"]["status"], "error");
    assert_eq!(body["checks"]["output_dir"]["status"], "ok");
    assert_eq!(body["checks"]["background_image"]["status"], "ok");
}

#[tokio::test]
async fn test_convert_malformed_xml() {
    let app = test_app();
    let response = app
        .router
        .oneshot(convert_request(&[("vast_input", None, "<VAST><Ad>")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "malformed_input");
}

#[tokio::test]
async fn test_convert_without_media() {
    let app = test_app();
    let xml = r#"<VAST><AdTitle>Spot</AdTitle><ClickThrough>https://brand.example/</ClickThrough></VAST>"#;
    let response = app
        .router
        .oneshot(convert_request(&[("vast_input", None, xml)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["code"], "no_suitable_media");
}

#[tokio::test]
async fn test_convert_without_input() {
    let app = test_app();
    let response = app
        .router
        .oneshot(convert_request(&[("vast_input", None, "   ")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_input");
}

#[tokio::test]
async fn test_convert_rejects_disallowed_upload() {
    let app = test_app();
    let response = app
        .router
        .oneshot(convert_request(&[("vast_file", Some("tag.json"), VAST)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_convert_blocks_internal_vast_url() {
    let app = test_app();
    let response = app
        .router
        .oneshot(convert_request(&[("vast_input", None, "http://127.0.0.1:9/vast.xml")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_input");
}

#[tokio::test]
async fn test_convert_reports_engine_unavailable() {
    let app = test_app();
    let response = app
        .router
        .oneshot(convert_request(&[("vast_file", Some("tag.xml"), VAST)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["code"], "engine_unavailable");
}

#[cfg(unix)]
#[tokio::test]
async fn test_convert_success_and_artifact_delivery() {
    use std::os::unix::fs::PermissionsExt;

    let app = test_app_with(
        |dir| {
            let path = dir.path().join("fake-ffmpeg");
            std::fs::write(&path, "#!/bin/sh\nfor last; do :; done\nprintf 'mp4' > \"$last\"\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            EngineLocation::at(path)
        },
        100,
    );

    let response = app
        .router
        .clone()
        .oneshot(convert_request(&[("vast_input", None, VAST)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["title"], "ABC_Nike_Campaign");
    assert_eq!(body["brand"], "Nike");
    assert_eq!(body["media_file_url"], "https://cdn.example/ad.mp4");
    assert_eq!(body["raw_clickthrough_url"], "https://track.example/c?u=https%3A%2F%2Fnike.example%2Frun");
    assert_eq!(body["resolved_url"], "https://nike.example/run");
    assert_eq!(body["display_url"], "nike.example/run");

    let job_id = body["job_id"].as_str().unwrap();
    let video_url = body["video_url"].as_str().unwrap();
    assert_eq!(video_url, format!("/generated/output_Nike_{job_id}.mp4"));
    assert_eq!(body["qr_code_url"], format!("/generated/qrcode_{job_id}.png"));
    assert_eq!(body["log_url"], format!("{video_url}.log"));

    let video = app.router.clone().oneshot(get(video_url)).await.unwrap();
    assert_eq!(video.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(video.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"mp4");

    let download = app
        .router
        .clone()
        .oneshot(get(body["download_url"].as_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    assert!(download.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let qr = app
        .router
        .oneshot(get(body["qr_code_url"].as_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(qr.status(), StatusCode::OK);
    assert_eq!(qr.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_artifact_not_found() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get("/generated/output_missing_00000000.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_artifact_traversal_rejected() {
    let app = test_app();
    std::fs::write(app.dir.path().join("secret.txt"), "secret").unwrap();
    std::fs::create_dir_all(app.output_dir()).unwrap();

    let response = app
        .router
        .oneshot(get("/generated/..%2Fsecret.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_convert_is_rate_limited() {
    let app = test_app_with(|dir| EngineLocation::at(dir.path().join("missing-ffmpeg")), 1);

    let first = app
        .router
        .clone()
        .oneshot(convert_request(&[("vast_input", None, "<VAST><Ad>")]))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = app
        .router
        .oneshot(convert_request(&[("vast_input", None, "<VAST><Ad>")]))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()["retry-after"], "1");
}
