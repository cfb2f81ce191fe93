//! Study aid generation
//!
//! Turns extracted document text into summaries, flashcards and quizzes.
//!
//! Backends:
//! - OpenAI-compatible chat completions (schema mode via `response_format`)
//! - Ollama chat (schema mode via `format`)
//! - none: deterministic fallback heuristics, marked as such
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lectern_server::generation::{StudyService, StructuredGenerator, SummaryLength};
//!
//! let outcome = service.summarize(&text, "biology", SummaryLength::Short).await?;
//! ```

mod backend;
mod error;
mod fallback;
mod json;
mod sanitize;
mod service;
mod structured;
mod summary;
mod types;

pub use backend::{
    BackendError, CompletionOutput, CompletionRequest, GenerationBackend, OllamaBackend,
    OpenAiBackend,
};
pub use error::GenerationError;
pub use json::{extract_json, JsonRecoveryError};
pub use sanitize::{sanitize_cards, sanitize_questions};
pub use service::{StudyService, StudySettings, MAX_ITEMS};
pub use structured::{GenerationRequest, GeneratorSettings, StructuredGenerator};
pub use summary::{split_chunks, ChunkedSummaryPipeline, DEFAULT_CHUNK_CHARS};
pub use types::{
    Card, Difficulty, GeneratedArtifact, GenerationMode, GenerationOutcome, Question, RawCard,
    RawQuestion, SummaryLength,
};
