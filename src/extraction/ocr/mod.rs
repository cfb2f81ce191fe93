//! OCR Module
//!
//! Reads text from rendered pages of scanned PDFs.
//!
//! Supports multiple backends:
//! - Tesseract (local, requires the `ocr-tesseract` feature and libtesseract)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lectern_server::extraction::ocr::{OcrService, OcrServiceConfig};
//!
//! let service = OcrService::new(OcrServiceConfig::default());
//!
//! // Check available providers
//! let providers = service.available_providers().await;
//!
//! // OCR rendered page images
//! let text = service.recognize_pages(&png_pages).await?;
//! ```

mod provider;
mod service;
mod types;

pub use provider::{OcrProviderTrait, OllamaProvider};
pub use service::{OcrService, OcrServiceConfig};
pub use types::{OcrError, OcrProvider, OcrResult};

#[cfg(feature = "ocr-tesseract")]
pub use provider::TesseractProvider;
