//! Text extraction route
//!
//! - POST /api/v1/extract - multipart `file` (PDF) -> extracted text

use axum::{extract::{Multipart, State}, routing::post, Json, Router};
use serde::Serialize;

use super::PdfUpload;
use crate::error::Result;
use crate::extraction::ExtractionMethod;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(extract))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub pages: usize,
    pub method: ExtractionMethod,
    pub chars: usize,
    pub text: String,
}

async fn extract(State(state): State<AppState>, multipart: Multipart) -> Result<Json<ExtractResponse>> {
    let upload = PdfUpload::read(multipart).await?;
    let extracted = state.extractor().extract_text(&upload.bytes).await?;

    tracing::info!(
        pages = extracted.pages,
        method = ?extracted.method,
        "extracted document text"
    );

    Ok(Json(ExtractResponse {
        file_name: upload.file_name,
        pages: extracted.pages,
        method: extracted.method,
        chars: extracted.text.chars().count(),
        text: extracted.text,
    }))
}
