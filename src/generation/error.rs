//! Generation error types

use thiserror::Error;

use super::backend::BackendError;
use crate::governor::QueueError;

/// Errors surfaced by the generation core
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No backend configured; callers switch to fallback generation
    #[error("No generation backend configured")]
    UpstreamUnavailable,

    /// Upstream kept throttling after every retry
    #[error("Upstream service is rate limiting requests; try again later")]
    RateLimited,

    /// Model output could not be decoded after all attempts
    #[error("Model returned malformed output after {attempts} attempt(s): {reason} (output began: {snippet:?})")]
    MalformedModelOutput {
        attempts: u32,
        reason: String,
        snippet: String,
    },

    /// Decoded output had nothing usable left after sanitization
    #[error("Generated content failed validation: {0}")]
    ValidationFailed(String),

    #[error("Input rejected: {0}")]
    InvalidInput(String),

    #[error("Generation backend error: {0}")]
    Backend(BackendError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<BackendError> for GenerationError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::RateLimited { .. } => GenerationError::RateLimited,
            other => GenerationError::Backend(other),
        }
    }
}

impl GenerationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::MalformedModelOutput { .. } | Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Queue(QueueError::Full(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
