//! Lectern Server
//!
//! Extracts text from uploaded PDFs and turns it into study aids
//! (summaries, flashcards, quizzes) through a rate-governed
//! text-generation backend.
//!
//! # Modules
//!
//! - `governor`: queue, rate window, retry and spread pacing for upstream calls
//! - `generation`: structured generation, chunked summaries, fallback heuristics
//! - `extraction`: PDF text layer via MuPDF with OCR fallback
//! - `routes`: axum HTTP surface

pub mod config;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod governor;
pub mod routes;
pub mod state;

use axum::{body::Body, extract::DefaultBodyLimit, http::Request, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use state::AppState;

/// Room for multipart boundaries and form fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_bytes + MULTIPART_OVERHEAD;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/health", get(routes::health::health_check))
        .nest("/api/v1/extract", routes::extract::router())
        .nest("/api/v1/study", routes::study::router())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
        .layer(cors)
        .with_state(state)
}
