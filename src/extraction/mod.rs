//! Text extraction
//!
//! The generation core only sees [`TextExtractor`]; the PDF implementation
//! reads the native text layer and falls back to OCR for scanned pages.

pub mod ocr;
mod pdf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use pdf::{PdfExtractionSettings, PdfTextExtractor};

use ocr::OcrError;

/// How the text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Native,
    Ocr,
}

/// Text pulled out of an uploaded document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub text: String,
    pub pages: usize,
    pub method: ExtractionMethod,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No extractable text found in document")]
    NoText,

    #[error("Failed to open document: {0}")]
    Open(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("Document is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Extraction task failed: {0}")]
    Join(String),
}

impl ExtractionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NoText => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Open(_) => StatusCode::BAD_REQUEST,
            Self::Ocr(e) => e.status_code(),
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ExtractionError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

/// Single capability consumed by the study service
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError>;
}
