//! OCR Providers
//!
//! Defines the provider trait and implementations for different OCR backends.

use async_trait::async_trait;

use super::types::{OcrError, OcrProvider, OcrResult};

/// OCR provider trait
#[async_trait]
pub trait OcrProviderTrait: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Perform OCR on a PNG page image
    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError>;
}

/// Tesseract OCR provider (libtesseract bindings)
#[cfg(feature = "ocr-tesseract")]
pub struct TesseractProvider {
    default_language: String,
}

#[cfg(feature = "ocr-tesseract")]
impl TesseractProvider {
    pub fn new(default_language: &str) -> Self {
        Self {
            default_language: default_language.to_string(),
        }
    }
}

#[cfg(feature = "ocr-tesseract")]
#[async_trait]
impl OcrProviderTrait for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        let lang = self.default_language.clone();
        tokio::task::spawn_blocking(move || tesseract::Tesseract::new(None, Some(&lang)).is_ok())
            .await
            .unwrap_or(false)
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(&self.default_language).to_string();
        let image = image_data.to_vec();

        let text = tokio::task::spawn_blocking(move || -> Result<String, OcrError> {
            let mut engine = tesseract::Tesseract::new(None, Some(&lang))
                .map_err(|e| OcrError::ProviderNotAvailable(format!("Tesseract init failed: {}", e)))?
                .set_image_from_mem(&image)
                .map_err(|e| OcrError::ImageExtractionError(e.to_string()))?;
            engine
                .get_text()
                .map_err(|e| OcrError::ProcessingError(format!("Tesseract failed: {}", e)))
        })
        .await
        .map_err(|e| OcrError::ProcessingError(format!("Tesseract task failed: {}", e)))??;

        Ok(OcrResult {
            text: text.trim().to_string(),
            confidence: 80.0,
            provider: OcrProvider::Tesseract,
        })
    }
}

/// Ollama vision model provider
pub struct OllamaProvider {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn request_body(&self, image_data: &[u8], language: Option<&str>) -> serde_json::Value {
        use base64::Engine;

        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);
        let lang_hint = language
            .map(|l| format!(" The text is in {}.", l))
            .unwrap_or_default();
        let prompt = format!(
            "Extract all text from this page image exactly as written, in reading order.{} \
             Return only the extracted text, nothing else.",
            lang_hint
        );

        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [image_base64],
            "stream": false
        })
    }
}

#[async_trait]
impl OcrProviderTrait for OllamaProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(image_data, language))
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!("Ollama returned {}: {}", status, body)));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = result["response"].as_str().unwrap_or("").trim().to_string();

        Ok(OcrResult {
            text,
            confidence: 75.0, // LLMs don't provide confidence scores
            provider: OcrProvider::Ollama,
        })
    }
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub provider: OcrProvider,
    pub available: bool,
    /// `None` makes every call fail
    pub text: Option<String>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn answering(provider: OcrProvider, text: &str) -> Self {
        Self {
            provider,
            available: true,
            text: Some(text.to_string()),
            calls: Default::default(),
        }
    }

    pub fn failing(provider: OcrProvider) -> Self {
        Self {
            provider,
            available: true,
            text: None,
            calls: Default::default(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl OcrProviderTrait for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        self.provider
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, _image_data: &[u8], _language: Option<&str>) -> Result<OcrResult, OcrError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(OcrResult {
                text: text.clone(),
                confidence: 90.0,
                provider: self.provider,
            }),
            None => Err(OcrError::ProcessingError("mock failure".to_string())),
        }
    }
}
