//! Error types for the Lectern server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::generation::GenerationError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                msg.clone(),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Generation(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!("Generation error: {}", e);
                } else {
                    tracing::warn!("Generation error: {}", e);
                }
                let kind = match e {
                    GenerationError::UpstreamUnavailable => "upstream_unavailable",
                    GenerationError::RateLimited => "rate_limited",
                    GenerationError::MalformedModelOutput { .. } => "malformed_model_output",
                    GenerationError::ValidationFailed(_) => "validation_failed",
                    GenerationError::InvalidInput(_) => "bad_request",
                    GenerationError::Backend(_) => "upstream_error",
                    GenerationError::Queue(_) => "queue_unavailable",
                };
                (status, kind, e.to_string())
            }
            AppError::Extraction(e) => {
                tracing::warn!("Extraction error: {}", e);
                let kind = match e {
                    ExtractionError::NoText => "no_text",
                    ExtractionError::Open(_) => "invalid_document",
                    ExtractionError::Ocr(_) => "ocr_error",
                    ExtractionError::TooLarge { .. } => "payload_too_large",
                    ExtractionError::Join(_) => "internal_error",
                };
                (e.status_code(), kind, e.to_string())
            }
            AppError::Multipart(e) => (e.status(), "bad_request", e.body_text()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
