//! OCR Types
//!
//! Types shared by the OCR providers and the OCR service.

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Tesseract OCR (local, `ocr-tesseract` feature)
    Tesseract,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl OcrProvider {
    /// Parse a provider name as used in configuration
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Some(Self::Tesseract),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Text recognized on one page image
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    /// Recognized text
    pub text: String,
    /// Confidence score (0-100)
    pub confidence: f64,
    /// Provider used
    pub provider: OcrProvider,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Failed to prepare page image: {0}")]
    ImageExtractionError(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl OcrError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::ProviderNotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ApiError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(OcrProvider::parse(" Ollama "), Some(OcrProvider::Ollama));
        assert_eq!(OcrProvider::parse("tesseract"), Some(OcrProvider::Tesseract));
        assert_eq!(OcrProvider::parse("openai"), None);
    }
}
