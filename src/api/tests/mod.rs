use super::*;
use crate::jobs::test_helpers::{FakeDownloader, Fixture, fixture};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


fn app(f: &Fixture) -> Router {
    let catalog = CatalogClient::new(&f.config.catalog).unwrap();
    create_router(AppState::new(f.controller.clone(), catalog, f.config.clone()))
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn catalog_request(title: &str, start: u32, end: u32) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "source": { "type": "catalog", "id": "abc" },
        "range": { "start": start, "end": end },
        "combine": true
    })
}

/// Poll a job until it is terminal
async fn wait_for_job(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let (status, job) = get_json(app, &format!("/api/v1/jobs/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        if job["status"] != "running" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", id);
}

#[tokio::test]
async fn health_reports_gate_state() {
    let f = fixture(FakeDownloader::default());
    let (status, body) = get_json(&app(&f), "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["busy"], false);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let f = fixture(FakeDownloader::default());
    let (status, body) = get_json(&app(&f), "/api/v1/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "panelpress REST API");
}

#[tokio::test]
async fn cors_headers_when_enabled() {
    let f = fixture(FakeDownloader::default());
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app(&f).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn api_server_spawns_and_shuts_down() {
    let f = fixture(FakeDownloader::default());
    let mut config = (*f.config).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(
        f.controller.clone(),
        Arc::new(config),
        async move {
            let _ = rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
