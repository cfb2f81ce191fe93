use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tower::ServiceExt;

use lectern_server::build_router;
use lectern_server::config::Config;
use lectern_server::extraction::{ExtractedText, ExtractionError, ExtractionMethod, TextExtractor};
use lectern_server::state::AppState;

const NOTES: &str = "Mitochondria produce most of the chemical energy needed by the cell. \
    The mitochondrial membrane separates the matrix from the cytoplasm. \
    Mitochondria contain their own genetic material inherited maternally. \
    Cellular respiration happens across the mitochondrial membrane.";

/// Returns fixed text for any upload, or nothing at all
struct StubExtractor {
    text: Option<&'static str>,
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        match self.text {
            Some(text) => Ok(ExtractedText {
                text: text.to_string(),
                pages: 2,
                method: ExtractionMethod::Native,
            }),
            None => Err(ExtractionError::NoText),
        }
    }
}

fn state_with(text: Option<&'static str>) -> AppState {
    AppState::with_parts(Config::default(), Arc::new(StubExtractor { text }), None)
}

fn server_with(text: Option<&'static str>) -> TestServer {
    TestServer::new(build_router(state_with(text))).expect("test server must start")
}

fn pdf_form() -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.4 stub".to_vec())
            .file_name("notes.pdf")
            .mime_type("application/pdf"),
    )
}

#[tokio::test]
async fn health_reports_fallback_mode() {
    let server = server_with(Some(NOTES));

    let response = server.get("/api/v1/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["generation"]["mode"], json!("fallback"));
    assert_eq!(body["queue"]["active"], json!(0));
    assert_eq!(body["queue"]["concurrency"], json!(2));
}

#[tokio::test]
async fn flashcards_are_bounded_by_count() {
    let server = server_with(None);

    let response = server
        .post("/api/v1/study/flashcards")
        .json(&json!({ "text": NOTES, "subject": "biology", "count": 2 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["mode"], json!("fallback"));
    assert_eq!(body["artifact"]["type"], json!("flashcard_set"));
    let cards = body["artifact"]["cards"].as_array().expect("cards array");
    assert!(!cards.is_empty() && cards.len() <= 2);
}

#[tokio::test]
async fn quiz_questions_have_four_options() {
    let server = server_with(None);

    let response = server
        .post("/api/v1/study/quiz")
        .json(&json!({ "text": NOTES, "count": 3 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let questions = body["artifact"]["questions"].as_array().expect("questions array");
    assert!(!questions.is_empty());
    for question in questions {
        assert_eq!(question["options"].as_array().map(Vec::len), Some(4));
        assert!(question["correctIndex"].as_u64().expect("index") < 4);
    }
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let server = server_with(None);

    let response = server
        .post("/api/v1/study/summary")
        .json(&json!({ "text": "   " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], json!("bad_request"));
}

#[tokio::test]
async fn unknown_summary_length_is_rejected() {
    let server = server_with(None);

    let response = server
        .post("/api/v1/study/summary")
        .json(&json!({ "text": NOTES, "length": "epic" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_summary_extracts_then_summarizes() {
    let server = server_with(Some(NOTES));

    let response = server
        .post("/api/v1/study/upload/summary")
        .multipart(pdf_form().add_text("length", "short"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"]["fileName"], json!("notes.pdf"));
    assert_eq!(body["source"]["pages"], json!(2));
    assert_eq!(body["source"]["method"], json!("native"));
    assert_eq!(body["artifact"]["type"], json!("summary"));
    assert!(body["artifact"]["text"]
        .as_str()
        .expect("summary text")
        .starts_with("Mitochondria produce"));
}

#[tokio::test]
async fn upload_without_text_is_unprocessable() {
    let server = server_with(None);

    let response = server
        .post("/api/v1/study/upload/quiz")
        .multipart(pdf_form().add_text("count", "3"))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"], json!("no_text"));
}

#[tokio::test]
async fn non_pdf_upload_is_rejected() {
    let server = server_with(Some(NOTES));
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"hello".to_vec())
            .file_name("notes.txt")
            .mime_type("text/plain"),
    );

    let response = server.post("/api/v1/extract").multipart(form).await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn extract_returns_text_and_method() {
    let server = server_with(Some(NOTES));

    let response = server.post("/api/v1/extract").multipart(pdf_form()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["method"], json!("native"));
    assert_eq!(body["text"], json!(NOTES));
    assert_eq!(body["chars"], json!(NOTES.chars().count()));
}

#[tokio::test]
async fn root_health_responds_without_test_server() {
    let app = build_router(state_with(None));
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("request builder must not fail");

    let response = app.oneshot(request).await.expect("handler should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body must be collected");
    let value: Value = serde_json::from_slice(&bytes).expect("valid json");
    assert_eq!(value["service"], json!("lectern-server"));
}
