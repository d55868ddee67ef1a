//! Router-level tests driving the public API with a stubbed speech endpoint.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use docutape_backend::controllers::conversion::ConversionController;
use docutape_backend::controllers::history::HistoryController;
use docutape_backend::domain::conversion::{ConversionService, JobRegistry};
use docutape_backend::infrastructure::config::Config;
use docutape_backend::infrastructure::db::{create_pool, init_schema};
use docutape_backend::infrastructure::http::build_router;
use docutape_backend::infrastructure::repositories::{
    ConversionRepository, SpeechError, SpeechRepository, SpeechRequest,
};
use docutape_backend::infrastructure::storage::StorageQuota;

/// Always-successful endpoint returning a minimal ID3-tagged payload
struct StubSpeech;

#[async_trait]
impl SpeechRepository for StubSpeech {
    async fn synthesize(&self, _request: SpeechRequest<'_>) -> Result<Vec<u8>, SpeechError> {
        let mut bytes = b"ID3".to_vec();
        bytes.resize(256, 0);
        Ok(bytes)
    }
}

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
}

async fn test_app() -> TestApp {
    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().to_path_buf();
    std::fs::create_dir_all(data_dir.join("audio")).unwrap();
    std::fs::create_dir_all(data_dir.join("sources")).unwrap();

    let config = Arc::new(Config::for_tests(&data_dir));
    let pool = Arc::new(create_pool(&config.database_path()).await.unwrap());
    init_schema(&pool).await.unwrap();

    let conversion_repo = Arc::new(ConversionRepository::new(pool));
    let speech_repo: Arc<dyn SpeechRepository> = Arc::new(StubSpeech);
    let storage = Arc::new(StorageQuota::new(
        &config.data_dir,
        config.max_storage_bytes,
        conversion_repo.clone(),
    ));
    let jobs = Arc::new(JobRegistry::new());
    let service = Arc::new(ConversionService::new(
        config.clone(),
        speech_repo,
        conversion_repo.clone(),
        storage.clone(),
        jobs.clone(),
    ));

    let conversion_controller = Arc::new(ConversionController::new(service, jobs, config.clone()));
    let history_controller = Arc::new(HistoryController::new(conversion_repo, storage.clone()));

    TestApp {
        _dir: dir,
        router: build_router(conversion_controller, history_controller, storage),
    }
}

const BOUNDARY: &str = "docutape-test-boundary";

fn multipart_body(fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn convert_request(fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap()
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn json_of(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    // A caller-supplied id is echoed back unchanged
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "trace-me-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me-123"
    );
}

#[tokio::test]
async fn test_health_reports_storage() {
    let app = test_app().await;
    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["storage_max_gb"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_voices_listed() {
    let app = test_app().await;
    let (status, body) = get(&app.router, "/api/voices").await;
    assert_eq!(status, StatusCode::OK);
    let voices = body["voices"].as_array().unwrap();
    assert!(voices.iter().any(|v| v == "af_alloy"));
    let speeds = body["speeds"].as_array().unwrap();
    assert!(speeds.iter().any(|s| s.as_f64() == Some(1.0)));
}

#[tokio::test]
async fn test_convert_rejects_empty_submission() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(convert_request(&[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_of(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No text or file provided"));
}

#[tokio::test]
async fn test_convert_rejects_unknown_voice() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(convert_request(&[
            ("text", "Some perfectly fine text."),
            ("voice", "narrator_9000"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_convert_rejects_out_of_range_speed() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(convert_request(&[
            ("text", "Some perfectly fine text."),
            ("speed", "9.0"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(convert_request(&[
            ("text", "Some perfectly fine text."),
            ("speed", "not-a-number"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn file_upload_request(filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_convert_accepts_text_file_upload() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(file_upload_request(
            "story.txt",
            "Once upon a time there was a very small backend.",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert!(body["job_id"].is_string());
}

#[tokio::test]
async fn test_convert_rejects_unsupported_file_type() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(file_upload_request("binary.docx", "not supported"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_of(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported file type"));
}

#[tokio::test]
async fn test_status_of_unknown_job_is_404() {
    let app = test_app().await;
    let (status, _) = get(
        &app.router,
        "/api/status/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app.router, "/api/status/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_conversion_lifecycle() {
    let app = test_app().await;

    // Submit
    let response = app
        .router
        .clone()
        .oneshot(convert_request(&[
            ("text", "Hello from the lifecycle test. It has two sentences."),
            ("voice", "af_nova"),
            ("speed", "1.25"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert!(body["content_length"].as_u64().unwrap() > 0);

    // Poll until terminal
    let mut status_body = Value::Null;
    for _ in 0..200 {
        let (status, body) = get(&app.router, &format!("/api/status/{job_id}")).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "processing" {
            status_body = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status_body["status"], "completed", "{status_body}");
    assert_eq!(status_body["progress"], 100);
    let result_id = status_body["result_id"].as_str().unwrap().to_string();

    // Result metadata
    let (status, result) = get(&app.router, &format!("/api/result/{result_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        result["audio_url"],
        format!("/api/audio/{result_id}").as_str()
    );

    // Audio download
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/audio/{result_id}?download=1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/mpeg"
    );
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("attachment"));
    let audio = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(audio.starts_with(b"ID3"));

    // History listing and detail
    let (status, history) = get(&app.router, "/api/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["items"].as_array().unwrap().len(), 1);
    assert_eq!(history["items"][0]["voice"], "af_nova");
    assert!(history["items"][0]["full_text"].is_null());

    let (status, detail) = get(&app.router, &format!("/api/history/{result_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["full_text"]
        .as_str()
        .unwrap()
        .contains("lifecycle test"));

    // Delete removes record and audio
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/history/{result_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = get(&app.router, &format!("/api/audio/{result_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
