//! Drives the HTTP request adapter end to end: build the real router over a
//! registry loaded from an on-disk fixture dataset, and issue requests
//! through it with no running TCP listener (`tower::ServiceExt::oneshot`).

use std::fs;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use groundlevel::engine::RasterPool;
use groundlevel::registry::DatasetRegistry;
use groundlevel::web::build_router;
use http_body_util::BodyExt;
use serde_json::Value;
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use tower::ServiceExt;

fn write_geotiff(path: &std::path::Path, values: &[i32], width: u32, height: u32) {
    let file = fs::File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(file).unwrap();
    let mut image = tiff.new_image::<colortype::GrayI32>(width, height).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 122.0, 57.0, 0.0][..])
        .unwrap();
    image.write_data(values).unwrap();
}

fn test_app() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let tif_path = dir.path().join("test.tif");
    write_geotiff(&tif_path, &[815, 820, 810, 805], 2, 2);

    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
            [[datasets]]
            name = "test"
            default_kernel = "nearest"

            [datasets.tiling_scheme]
            type = "single_file"
            path = {:?}
            "#,
            tif_path
        ),
    )
    .unwrap();

    let registry = Arc::new(DatasetRegistry::load(&config_path).unwrap());
    (build_router(registry, RasterPool::default()), dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_request_returns_elevation_for_a_known_point() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/test?locations=56.8,122.2&interpolation=nearest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["results"][0]["elevation"], 815.0);
}

#[tokio::test]
async fn post_request_accepts_a_json_body() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/test")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({"locations": [[56.8, 122.2]], "interpolation": "nearest"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["results"][0]["elevation"], 815.0);
}

#[tokio::test]
async fn unknown_dataset_returns_invalid_status() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/nonexistent?locations=0,0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "INVALID");
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
