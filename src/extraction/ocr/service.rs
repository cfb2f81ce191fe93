//! OCR Service
//!
//! Orchestrates OCR providers over rendered page images.

use std::sync::Arc;

use super::{
    provider::{OcrProviderTrait, OllamaProvider},
    types::{OcrError, OcrProvider, OcrResult},
};

/// OCR service configuration
#[derive(Debug, Clone)]
pub struct OcrServiceConfig {
    /// Preferred provider order
    pub providers: Vec<OcrProvider>,
    /// Ollama base URL
    pub ollama_url: String,
    /// Ollama model name
    pub ollama_model: String,
    /// Default OCR language
    pub default_language: String,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            providers: vec![OcrProvider::Tesseract, OcrProvider::Ollama],
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llava".to_string(),
            default_language: "eng".to_string(),
        }
    }
}

/// OCR service for scanned PDF pages
pub struct OcrService {
    config: OcrServiceConfig,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

impl OcrService {
    /// Create a new OCR service from the configured provider order
    pub fn new(config: OcrServiceConfig) -> Self {
        let mut providers: Vec<Arc<dyn OcrProviderTrait>> = Vec::new();

        for kind in &config.providers {
            match kind {
                #[cfg(feature = "ocr-tesseract")]
                OcrProvider::Tesseract => {
                    use super::provider::TesseractProvider;
                    providers.push(Arc::new(TesseractProvider::new(&config.default_language)));
                }
                #[cfg(not(feature = "ocr-tesseract"))]
                OcrProvider::Tesseract => {
                    tracing::debug!("tesseract requested but the ocr-tesseract feature is disabled");
                }
                OcrProvider::Ollama => {
                    providers.push(Arc::new(OllamaProvider::new(
                        &config.ollama_url,
                        &config.ollama_model,
                    )));
                }
            }
        }

        Self { config, providers }
    }

    /// Create a service over explicit providers
    pub fn with_providers(config: OcrServiceConfig, providers: Vec<Arc<dyn OcrProviderTrait>>) -> Self {
        Self { config, providers }
    }

    /// Whether any provider is configured at all
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.provider_type());
            }
        }
        available
    }

    /// Perform OCR on one page image, trying providers in order
    pub async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(&self.config.default_language);

        for provider in &self.providers {
            if !provider.is_available().await {
                continue;
            }
            match provider.recognize(image_data, Some(lang)).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        "OCR provider {:?} failed: {}, trying next",
                        provider.provider_type(),
                        e
                    );
                }
            }
        }

        Err(OcrError::ProviderNotAvailable(
            "No OCR providers available".to_string(),
        ))
    }

    /// OCR every page image in order and join the text
    ///
    /// Pages that yield no text are skipped; a page no provider could read
    /// fails the whole call.
    pub async fn recognize_pages(&self, pages: &[Vec<u8>]) -> Result<String, OcrError> {
        let mut texts = Vec::with_capacity(pages.len());
        for (index, image) in pages.iter().enumerate() {
            let result = self.recognize(image, None).await?;
            tracing::debug!(
                page = index + 1,
                provider = ?result.provider,
                chars = result.text.len(),
                "OCR page done"
            );
            if !result.text.is_empty() {
                texts.push(result.text);
            }
        }
        Ok(texts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::super::provider::MockProvider;
    use super::*;

    #[tokio::test]
    async fn test_ocr_service_creation() {
        let config = OcrServiceConfig::default();
        let service = OcrService::new(config);

        // Tesseract is only present with the feature enabled
        assert!(service.has_providers());
        assert!(service.providers.len() <= 2);
    }

    #[tokio::test]
    async fn test_empty_provider_list() {
        let service = OcrService::new(OcrServiceConfig {
            providers: Vec::new(),
            ..OcrServiceConfig::default()
        });
        assert!(!service.has_providers());

        let result = service.recognize(b"png", None).await;
        assert!(matches!(result, Err(OcrError::ProviderNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let broken = Arc::new(MockProvider::failing(OcrProvider::Tesseract));
        let working = Arc::new(MockProvider::answering(OcrProvider::Ollama, "page text"));
        let service = OcrService::with_providers(
            OcrServiceConfig::default(),
            vec![broken.clone(), working.clone()],
        );

        let result = service.recognize(b"png", None).await.unwrap();

        assert_eq!(result.text, "page text");
        assert_eq!(result.provider, OcrProvider::Ollama);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(working.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_skipped() {
        let mut offline = MockProvider::answering(OcrProvider::Ollama, "never");
        offline.available = false;
        let offline = Arc::new(offline);
        let service = OcrService::with_providers(OcrServiceConfig::default(), vec![offline.clone()]);

        assert!(service.available_providers().await.is_empty());
        assert!(service.recognize(b"png", None).await.is_err());
        assert_eq!(offline.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recognize_pages_joins_text() {
        let provider = Arc::new(MockProvider::answering(OcrProvider::Ollama, "scanned"));
        let service = OcrService::with_providers(OcrServiceConfig::default(), vec![provider.clone()]);

        let text = service
            .recognize_pages(&[b"one".to_vec(), b"two".to_vec()])
            .await
            .unwrap();

        assert_eq!(text, "scanned\n\nscanned");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
