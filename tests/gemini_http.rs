//! Gemini wire-format tests against a local `wiremock` server.

use blueprint_estimator::{
    estimate_from_bytes, list_models, Credential, EstimatorConfig, EstimatorError, FileState,
    GeminiClient, RemoteModel,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPLY: &str = "```json\n[{\"kategori\":\"Struktur\",\"item\":\"Kolom Beton K-300\",\"satuan\":\"m3\",\"estimasi_volume\":12.5,\"catatan\":\"-\"}]\n```";

fn config_for(server: &MockServer) -> EstimatorConfig {
    EstimatorConfig::builder()
        .credential(Credential::manual("test-key"))
        .base_url(server.uri())
        .poll_interval(Duration::from_millis(5))
        .build()
        .unwrap()
}

fn file_json(state: &str) -> Value {
    json!({
        "name": "files/abc-123",
        "displayName": "Gambar Kerja",
        "mimeType": "application/pdf",
        "sizeBytes": "8",
        "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc-123",
        "state": state
    })
}

async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("x-goog-api-key", "test-key"))
        .and(header("x-goog-upload-command", "start"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-goog-upload-url", format!("{}/upload-session/1", server.uri())),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload-session/1"))
        .and(header_exists("x-goog-upload-offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file": file_json("PROCESSING") })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_polls(server: &MockServer, processing_polls: u64, final_state: &str) {
    if processing_polls > 0 {
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_json("PROCESSING")))
            .up_to_n_times(processing_polls)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(final_state)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_over_http() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    mount_polls(&server, 2, "ACTIVE").await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": REPLY }], "role": "model" },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let estimate = estimate_from_bytes(b"%PDF-1.4", "denah.pdf", &config_for(&server))
        .await
        .unwrap();

    assert_eq!(estimate.items.len(), 1);
    assert_eq!(estimate.items[0].item(), Some("Kolom Beton K-300"));
    assert_eq!(estimate.items[0].estimated_quantity(), Some(12.5));
    assert_eq!(estimate.stats.poll_count, 3);
    assert_eq!(estimate.raw_text, REPLY);

    // The generation request references the uploaded file and carries the prompt.
    let requests = server.received_requests().await.unwrap();
    let generate = requests
        .iter()
        .find(|r| r.url.path().ends_with(":generateContent"))
        .expect("generation request sent");
    let body: Value = serde_json::from_slice(&generate.body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(
        parts[0]["file_data"],
        json!({
            "mime_type": "application/pdf",
            "file_uri": "https://generativelanguage.googleapis.com/v1beta/files/abc-123"
        })
    );
    assert!(parts[1]["text"].as_str().unwrap().contains("Quantity Surveyor"));

    // The upload start announced the right size and type.
    let start = &requests[0];
    assert_eq!(
        start.headers.get("x-goog-upload-header-content-type").unwrap(),
        "application/pdf"
    );
    assert_eq!(
        start.headers.get("x-goog-upload-header-content-length").unwrap(),
        "8"
    );
    let start_body: Value = serde_json::from_slice(&start.body).unwrap();
    assert_eq!(start_body["file"]["display_name"], "Gambar Kerja");
}

#[tokio::test]
async fn failed_state_over_http_never_generates() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    mount_polls(&server, 0, "FAILED").await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = estimate_from_bytes(b"\x89PNG", "tampak.png", &config_for(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, EstimatorError::RemoteProcessingFailed { ref name } if name == "files/abc-123"));
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let err = estimate_from_bytes(b"%PDF", "denah.pdf", &config_for(&server))
        .await
        .unwrap_err();

    match err {
        EstimatorError::UploadFailed { reason } => {
            assert!(reason.contains("INVALID_ARGUMENT"), "got: {reason}");
            assert!(reason.contains("API key not valid"), "got: {reason}");
        }
        other => panic!("expected UploadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_upload_url_is_an_upload_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = estimate_from_bytes(b"%PDF", "denah.pdf", &config_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, EstimatorError::UploadFailed { .. }));
}

#[tokio::test]
async fn blocked_prompt_is_a_generation_failure() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    mount_polls(&server, 0, "ACTIVE").await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        )
        .mount(&server)
        .await;

    let err = estimate_from_bytes(b"%PDF", "denah.pdf", &config_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, EstimatorError::GenerationFailed { ref reason } if reason.contains("SAFETY")));
}

#[tokio::test]
async fn poll_error_names_the_file() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc-123"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = estimate_from_bytes(b"%PDF", "denah.pdf", &config_for(&server))
        .await
        .unwrap_err();
    match err {
        EstimatorError::PollFailed { name, reason } => {
            assert_eq!(name, "files/abc-123");
            assert!(reason.contains("503"), "got: {reason}");
        }
        other => panic!("expected PollFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_state_string_is_unspecified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("SOMETHING_NEW")))
        .mount(&server)
        .await;

    let client = GeminiClient::new(&config_for(&server)).unwrap();
    let file = client.get_file("files/abc-123").await.unwrap();
    assert_eq!(file.state, FileState::Unspecified);
}

#[tokio::test]
async fn model_listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{
                "name": "models/gemini-1.5-pro",
                "displayName": "Gemini 1.5 Pro",
                "supportedGenerationMethods": ["generateContent", "countTokens"]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {
                    "name": "models/gemini-1.5-flash",
                    "displayName": "Gemini 1.5 Flash",
                    "supportedGenerationMethods": ["generateContent"]
                },
                {
                    "name": "models/embedding-001",
                    "supportedGenerationMethods": ["embedContent"]
                }
            ],
            "nextPageToken": "p2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let models = list_models(&config_for(&server)).await.unwrap();
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["models/gemini-1.5-flash", "models/gemini-1.5-pro"]);
}
