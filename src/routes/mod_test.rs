use super::*;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, header};
use tower::ServiceExt;

use crate::config::NodeConfig;
use crate::render::SceneRenderer;
use crate::services::node::Node;

const BODY_LIMIT: usize = 1024 * 1024;

fn node() -> (Node, NodeHandle) {
    let mut config = NodeConfig::default();
    config.table.pixels_per_meter = 100.0;
    Node::new(&config, Arc::new(SceneRenderer::new(95, None)))
}

fn running_node() -> NodeHandle {
    let (node, handle) = node();
    tokio::spawn(node.run());
    handle
}

fn stopped_node() -> NodeHandle {
    let (node, handle) = node();
    drop(node);
    handle
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let response = app(stopped_node())
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn projectors_calibrated_is_null_until_published() {
    let handle = stopped_node();
    let router = app(handle.clone());

    let response = router
        .clone()
        .oneshot(Request::get("/projectors_calibrated").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({ "calibrated": null }));

    handle.status.publish(true);
    let response = router
        .oneshot(Request::get("/projectors_calibrated").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({ "calibrated": true }));
}

#[tokio::test]
async fn touch_calibration_is_accepted_by_running_node() {
    let handle = running_node();
    let response = app(handle.clone())
        .oneshot(post_json("/touch_calibration", r#"{"points":[{"x":0.1,"y":0.2},{"x":0.5,"y":0.5}]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "success": true }));
    handle.shutdown().await;
}

#[tokio::test]
async fn touch_calibration_rejects_malformed_body() {
    let response = app(running_node())
        .oneshot(post_json("/touch_calibration", r#"{"pts":[]}"#))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn touch_calibration_without_node_is_unavailable() {
    let response = app(stopped_node())
        .oneshot(post_json("/touch_calibration", r#"{"points":[]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn touch_detected_is_accepted() {
    let handle = running_node();
    let response = app(handle.clone())
        .oneshot(Request::post("/touch_detected").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    handle.shutdown().await;
}

#[tokio::test]
async fn touch_detected_without_node_is_unavailable() {
    let response = app(stopped_node())
        .oneshot(Request::post("/touch_detected").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn scene_jpg_returns_jpeg() {
    let handle = running_node();
    let response = app(handle.clone())
        .oneshot(Request::get("/scene.jpg").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    handle.shutdown().await;
}
