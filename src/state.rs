//! Application state management

use std::sync::Arc;

use crate::config::{Config, GenerationProvider};
use crate::extraction::ocr::OcrService;
use crate::extraction::{PdfTextExtractor, TextExtractor};
use crate::generation::{
    GenerationBackend, OllamaBackend, OpenAiBackend, StructuredGenerator, StudyService,
};
use crate::governor::{RequestGovernor, SpreadScheduler};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    extractor: Arc<dyn TextExtractor>,
    study: StudyService,
}

impl AppState {
    /// Build the state from configuration
    ///
    /// Spawns the governor's queue dispatcher, so this must run inside the
    /// tokio runtime.
    pub fn new(config: Config) -> Self {
        let ocr = OcrService::new(config.ocr_config());
        let ocr = if ocr.has_providers() {
            Some(Arc::new(ocr))
        } else {
            None
        };
        let extractor = Arc::new(PdfTextExtractor::new(config.pdf_settings(), ocr));

        let backend = build_backend(&config);
        Self::with_parts(config, extractor, backend)
    }

    /// Build the state around an explicit extractor and backend
    pub fn with_parts(
        config: Config,
        extractor: Arc<dyn TextExtractor>,
        backend: Option<Arc<dyn GenerationBackend>>,
    ) -> Self {
        let governor = RequestGovernor::new(config.governor_config());
        let generator = StructuredGenerator::new(backend, governor, config.generator_settings());
        let study = StudyService::new(
            generator,
            SpreadScheduler::new(config.spread_config()),
            config.study_settings(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                extractor,
                study,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the document text extractor
    pub fn extractor(&self) -> &dyn TextExtractor {
        self.inner.extractor.as_ref()
    }

    /// Get the study aid service
    pub fn study(&self) -> &StudyService {
        &self.inner.study
    }
}

fn build_backend(config: &Config) -> Option<Arc<dyn GenerationBackend>> {
    let generation = &config.generation;
    match generation.provider {
        GenerationProvider::None => {
            tracing::warn!("GENERATION_PROVIDER not set, study aids will use fallback heuristics");
            None
        }
        GenerationProvider::OpenAi => {
            let base_url = generation.base_url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
            let api_key = generation.api_key.as_deref().unwrap_or_default();
            tracing::info!("Generation backend: OpenAI-compatible at {}", base_url);
            let backend: Arc<dyn GenerationBackend> = Arc::new(OpenAiBackend::new(base_url, api_key));
            Some(backend)
        }
        GenerationProvider::Ollama => {
            let backend = match generation.base_url.as_deref() {
                Some(url) => OllamaBackend::new(url),
                None => OllamaBackend::default_url(),
            };
            tracing::info!("Generation backend: Ollama");
            let backend: Arc<dyn GenerationBackend> = Arc::new(backend);
            Some(backend)
        }
    }
}
