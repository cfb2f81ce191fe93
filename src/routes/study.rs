//! Study aid routes
//!
//! Endpoints:
//! - POST /api/v1/study/summary - JSON `{text, subject, length}`
//! - POST /api/v1/study/flashcards - JSON `{text, subject, count}`
//! - POST /api/v1/study/quiz - JSON `{text, subject, count}`
//! - POST /api/v1/study/upload/{summary,flashcards,quiz} - multipart `file`
//!   plus the same fields as form values; the PDF is extracted first

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::PdfUpload;
use crate::error::{AppError, Result};
use crate::extraction::ExtractionMethod;
use crate::generation::{GenerationOutcome, SummaryLength};
use crate::state::AppState;

const DEFAULT_COUNT: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", post(summary))
        .route("/flashcards", post(flashcards))
        .route("/quiz", post(quiz))
        .route("/upload/summary", post(upload_summary))
        .route("/upload/flashcards", post(upload_flashcards))
        .route("/upload/quiz", post(upload_quiz))
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub text: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub length: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsRequest {
    pub text: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub pages: usize,
    pub method: ExtractionMethod,
}

/// Generated artifact plus where its text came from
#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub source: SourceInfo,
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
}

fn parse_length(raw: Option<&str>) -> Result<SummaryLength> {
    match raw {
        None => Ok(SummaryLength::default()),
        Some(s) => SummaryLength::parse(s)
            .ok_or_else(|| AppError::BadRequest(format!("unknown summary length {:?}", s))),
    }
}

fn parse_count(raw: Option<&str>) -> Result<usize> {
    match raw {
        None => Ok(DEFAULT_COUNT),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("count must be a number, got {:?}", s))),
    }
}

async fn summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<GenerationOutcome>> {
    let length = parse_length(request.length.as_deref())?;
    let outcome = state
        .study()
        .summarize(&request.text, &request.subject, length)
        .await?;
    Ok(Json(outcome))
}

async fn flashcards(
    State(state): State<AppState>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<GenerationOutcome>> {
    let count = request.count.unwrap_or(DEFAULT_COUNT);
    let outcome = state
        .study()
        .flashcards(&request.text, &request.subject, count)
        .await?;
    Ok(Json(outcome))
}

async fn quiz(
    State(state): State<AppState>,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<GenerationOutcome>> {
    let count = request.count.unwrap_or(DEFAULT_COUNT);
    let outcome = state
        .study()
        .quiz(&request.text, &request.subject, count)
        .await?;
    Ok(Json(outcome))
}

/// Extract the upload and describe its source
async fn extract_upload(state: &AppState, upload: &PdfUpload) -> Result<(String, SourceInfo)> {
    let extracted = state.extractor().extract_text(&upload.bytes).await?;
    tracing::info!(
        pages = extracted.pages,
        method = ?extracted.method,
        chars = extracted.text.len(),
        "upload extracted, generating"
    );
    let source = SourceInfo {
        file_name: upload.file_name.clone(),
        pages: extracted.pages,
        method: extracted.method,
    };
    Ok((extracted.text, source))
}

async fn upload_summary(State(state): State<AppState>, multipart: Multipart) -> Result<Json<UploadOutcome>> {
    let upload = PdfUpload::read(multipart).await?;
    let length = parse_length(upload.field("length"))?;
    let subject = upload.field("subject").unwrap_or_default();

    let (text, source) = extract_upload(&state, &upload).await?;
    let outcome = state.study().summarize(&text, subject, length).await?;
    Ok(Json(UploadOutcome { source, outcome }))
}

async fn upload_flashcards(State(state): State<AppState>, multipart: Multipart) -> Result<Json<UploadOutcome>> {
    let upload = PdfUpload::read(multipart).await?;
    let count = parse_count(upload.field("count"))?;
    let subject = upload.field("subject").unwrap_or_default();

    let (text, source) = extract_upload(&state, &upload).await?;
    let outcome = state.study().flashcards(&text, subject, count).await?;
    Ok(Json(UploadOutcome { source, outcome }))
}

async fn upload_quiz(State(state): State<AppState>, multipart: Multipart) -> Result<Json<UploadOutcome>> {
    let upload = PdfUpload::read(multipart).await?;
    let count = parse_count(upload.field("count"))?;
    let subject = upload.field("subject").unwrap_or_default();

    let (text, source) = extract_upload(&state, &upload).await?;
    let outcome = state.study().quiz(&text, subject, count).await?;
    Ok(Json(UploadOutcome { source, outcome }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length(None).unwrap(), SummaryLength::Medium);
        assert_eq!(parse_length(Some("short")).unwrap(), SummaryLength::Short);
        assert!(parse_length(Some("epic")).is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(None).unwrap(), DEFAULT_COUNT);
        assert_eq!(parse_count(Some(" 7 ")).unwrap(), 7);
        assert!(matches!(parse_count(Some("seven")), Err(AppError::BadRequest(_))));
    }
}
