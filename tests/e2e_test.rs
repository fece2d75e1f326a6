//! HTTP surface: the API router served on a local port, backed by a mock
//! recognizer.

mod fixtures;
mod helpers;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

use helpers::{pipeline_for, serve, spawn_recognizer, unreachable_url, MockBehavior};
use plate_gate::app_state::AppState;
use plate_gate::routes::api_router;
use plate_gate::services::metrics::CSV_HEADER;

async fn spawn_api(behavior: MockBehavior) -> (String, helpers::MockRecognizer) {
    let mock = spawn_recognizer(behavior).await;
    let app = api_router(AppState::new(pipeline_for(&mock)));
    (serve(app).await, mock)
}

fn image_part(filename: &str, mime: &str, bytes: Vec<u8>) -> Part {
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime)
        .unwrap()
}

#[tokio::test]
async fn test_recognize_upload() {
    let (base, mock) = spawn_api(MockBehavior::plates(&[("abc1234", 0.95)])).await;
    let form = Form::new()
        .part("image", image_part("gate.jpg", "image/jpeg", fixtures::jpeg_bytes(8192, 1)))
        .text("regions", "US-CA, us-nv")
        .text("camera_id", "north-gate");

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/recognize"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["candidates"][0]["plate"], "ABC1234");
    assert_eq!(body["source"], "primary");
    assert_eq!(body["from_cache"], false);

    let seen = mock.seen();
    assert_eq!(seen[0].regions.as_deref(), Some("us-ca,us-nv"));
    assert_eq!(seen[0].camera_id.as_deref(), Some("north-gate"));
}

#[tokio::test]
async fn test_recognize_rejects_unsupported_format() {
    let (base, mock) = spawn_api(MockBehavior::plates(&[("abc1234", 0.95)])).await;
    let mut gif = b"GIF89a".to_vec();
    gif.resize(4096, 0);
    let form = Form::new().part("image", image_part("anim.gif", "image/gif", gif));

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/recognize"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("image/gif"));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_recognize_without_image_part() {
    let (base, _mock) = spawn_api(MockBehavior::plates(&[])).await;
    let form = Form::new().text("camera_id", "north-gate");

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/recognize"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recognizer_failure_maps_to_bad_gateway() {
    let (base, _mock) = spawn_api(MockBehavior::failing(503, "overloaded")).await;
    let form = Form::new().part(
        "image",
        image_part("gate.jpg", "image/jpeg", fixtures::jpeg_bytes(8192, 2)),
    );

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/recognize"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_bulk_upload_and_metrics_export() {
    let (base, _mock) = spawn_api(MockBehavior::plates(&[("abc1234", 0.95)])).await;
    let client = reqwest::Client::new();
    let form = Form::new()
        .part("image", image_part("a.jpg", "image/jpeg", fixtures::jpeg_bytes(8192, 3)))
        .part("image", image_part("b.jpg", "image/jpeg", fixtures::jpeg_bytes(8192, 4)));

    let response = client
        .post(format!("{base}/api/v1/recognize/bulk"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["total_processed"], 2);
    assert_eq!(summary["successful"], 2);
    assert_eq!(summary["results"][0]["filename"], "a.jpg");
    assert_eq!(summary["results"][1]["filename"], "b.jpg");

    let response = client
        .get(format!("{base}/api/v1/metrics/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let csv = response.text().await.unwrap();
    assert_eq!(csv.lines().next(), Some(CSV_HEADER));
    assert_eq!(csv.lines().count(), 3);

    let stats: Value = client
        .get(format!("{base}/api/v1/metrics/plate_recognition"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["operation"], "plate_recognition");
    assert_eq!(stats["success_rate"], 100.0);
}

#[tokio::test]
async fn test_health_reports_recognizer_state() {
    let (base, _mock) = spawn_api(MockBehavior::plates(&[])).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["cache"]["enabled"], true);

    let update = client
        .put(format!("{base}/api/v1/recognizer/endpoint"))
        .json(&json!({ "url": unreachable_url().await }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::OK);

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_endpoint_update_rejects_bad_url() {
    let (base, _mock) = spawn_api(MockBehavior::plates(&[])).await;

    let response = reqwest::Client::new()
        .put(format!("{base}/api/v1/recognizer/endpoint"))
        .json(&json!({ "url": "not a url" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cache_sweep_reports_counts() {
    let (base, _mock) = spawn_api(MockBehavior::plates(&[("abc1234", 0.95)])).await;
    let client = reqwest::Client::new();
    let form = Form::new().part(
        "image",
        image_part("gate.jpg", "image/jpeg", fixtures::jpeg_bytes(8192, 5)),
    );
    client
        .post(format!("{base}/api/v1/recognize"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    let body: Value = client
        .post(format!("{base}/api/v1/cache/sweep"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["removed"], 0);
    assert_eq!(body["remaining"], 1);
}
