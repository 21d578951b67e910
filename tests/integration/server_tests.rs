//! Tests of the HTTP surface, driven through the router without a listener

use crate::support::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use cbz_stream::server::{router, AppState};
use cbz_stream::Pipeline;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

fn app(temp_root: &TempDir) -> Router {
    let config = test_config(temp_root.path());
    router(AppState::new(Pipeline::new(&config).unwrap()))
}

fn series_request(series: &str) -> Request<Body> {
    let uri = Url::parse_with_params("http://localhost/", &[("series_url", series)]).unwrap();
    let target = format!("/?{}", uri.query().unwrap_or_default());
    Request::builder().uri(target).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let temp_root = TempDir::new().unwrap();
    let response = app(&temp_root)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_streams_series_archive() {
    let site = SeriesSite::start(vec![ChapterFixture::new(1, vec![IMAGE_SIZE])]).await;
    let temp_root = TempDir::new().unwrap();

    let response = app(&temp_root)
        .oneshot(series_request(site.series.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap(),
        "attachment; filename=\"42.zip\""
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        summarize(&body),
        vec![("1.cbz".to_string(), vec![("1-1.jpg".to_string(), IMAGE_SIZE)])]
    );
}

#[tokio::test]
async fn test_missing_parameter_is_bad_request() {
    let temp_root = TempDir::new().unwrap();
    let response = app(&temp_root)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_url_is_bad_request() {
    let temp_root = TempDir::new().unwrap();
    let response = app(&temp_root)
        .oneshot(series_request("not a url"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(temp_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_wrong_path_shape_is_unprocessable() {
    let temp_root = TempDir::new().unwrap();

    for series in [
        "https://example.com/series",
        "https://example.com/series/42/extra",
        "https://example.com/",
    ] {
        let response = app(&temp_root)
            .oneshot(series_request(series))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "{} should be rejected",
            series
        );
    }
    assert_eq!(std::fs::read_dir(temp_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_no_chapters_is_unprocessable() {
    let site = SeriesSite::with_chapter_list(&list_page("")).await;
    let temp_root = TempDir::new().unwrap();

    let response = app(&temp_root)
        .oneshot(series_request(site.series.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("no chapters found"));
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let site = SeriesSite::start(vec![]).await;
    let temp_root = TempDir::new().unwrap();
    let missing = site.series.join("/series/404").unwrap();

    let response = app(&temp_root)
        .oneshot(series_request(missing.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
