//! Structured generation
//!
//! Runs one logical generation request against the configured backend and
//! decodes the response into a typed value.
//!
//! Per attempt:
//!
//! 1. Queue admission, rate gate, and a retried call in schema mode; if the
//!    backend rejects schema mode the call is repeated in text mode
//! 2. A schema-parsed value is decoded directly
//! 3. Raw text goes through tolerant JSON recovery
//! 4. A decode failure with attempts left waits `150ms * attempt` and starts
//!    over with a fresh upstream call
//!
//! Transport failures and exhausted rate-limit retries are not re-attempted.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::backend::{BackendError, CompletionOutput, CompletionRequest, GenerationBackend};
use super::error::GenerationError;
use super::json::{extract_json, snippet};
use crate::governor::{QueueStats, RequestGovernor};

const PARSE_RETRY_STEP: Duration = Duration::from_millis(150);
const SNIPPET_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are a meticulous study assistant. You turn course material into accurate study aids. \
Respond only with JSON that matches the requested structure. Do not add commentary.";

/// One logical generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub instruction: String,
    pub content: String,
    pub temperature: f32,
    pub schema: Option<Value>,
    /// Overrides the generator default when set
    pub max_attempts: Option<u32>,
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            content: content.into(),
            temperature: 0.3,
            schema: None,
            max_attempts: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    fn user_prompt(&self) -> String {
        format!("{}\n\n--- MATERIAL ---\n{}", self.instruction, self.content)
    }
}

/// Generator settings
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Attempts per request when decoding fails
    pub max_attempts: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            max_attempts: 3,
        }
    }
}

/// Why a response could not be decoded
struct DecodeFailure {
    reason: String,
    text: String,
}

/// Backend + governor + decoding policy
pub struct StructuredGenerator {
    backend: Option<Arc<dyn GenerationBackend>>,
    governor: RequestGovernor,
    settings: GeneratorSettings,
}

impl StructuredGenerator {
    pub fn new(
        backend: Option<Arc<dyn GenerationBackend>>,
        governor: RequestGovernor,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            backend,
            governor,
            settings,
        }
    }

    /// Whether a backend is configured
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub async fn backend_available(&self) -> bool {
        match &self.backend {
            Some(backend) => backend.is_available().await,
            None => false,
        }
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.governor.queue_stats()
    }

    /// Generate and decode a value of type `T`
    pub async fn generate<T: DeserializeOwned>(
        &self,
        request: &GenerationRequest,
    ) -> Result<T, GenerationError> {
        let backend = self
            .backend
            .clone()
            .ok_or(GenerationError::UpstreamUnavailable)?;
        let max_attempts = request
            .max_attempts
            .unwrap_or(self.settings.max_attempts)
            .max(1);

        let completion = CompletionRequest {
            model: self.settings.model.clone(),
            temperature: request.temperature,
            max_tokens: self.settings.max_tokens,
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: request.user_prompt(),
            response_schema: request.schema.clone(),
        };

        let mut last_failure = None;
        for attempt in 1..=max_attempts {
            tracing::debug!(phase = "queued", attempt, max_attempts, "submitting generation request");
            let output = self.call(&backend, &completion).await?;

            tracing::debug!(phase = "parsing", attempt, "decoding model output");
            match decode::<T>(&output) {
                Ok(value) => {
                    tracing::debug!(phase = "done", attempt, "generation request complete");
                    return Ok(value);
                }
                Err(failure) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        "model output could not be decoded: {}",
                        failure.reason
                    );
                    last_failure = Some(failure);
                }
            }

            if attempt < max_attempts {
                tracing::debug!(phase = "retrying", attempt, "re-attempting generation");
                tokio::time::sleep(PARSE_RETRY_STEP * attempt).await;
            }
        }

        let failure = last_failure.unwrap_or(DecodeFailure {
            reason: "no attempts made".to_string(),
            text: String::new(),
        });
        tracing::error!(phase = "failed", max_attempts, "giving up on malformed model output");
        Err(GenerationError::MalformedModelOutput {
            attempts: max_attempts,
            reason: failure.reason,
            snippet: snippet(&failure.text, SNIPPET_CHARS),
        })
    }

    /// One governed upstream call, with text-mode fallback on schema rejection
    async fn call(
        &self,
        backend: &Arc<dyn GenerationBackend>,
        completion: &CompletionRequest,
    ) -> Result<CompletionOutput, GenerationError> {
        match self.governed(backend, completion.clone()).await? {
            Err(BackendError::SchemaUnsupported(reason)) => {
                tracing::warn!(
                    backend = backend.name(),
                    "schema mode rejected ({}), retrying in text mode",
                    snippet(&reason, 120)
                );
                Ok(self.governed(backend, completion.without_schema()).await??)
            }
            other => Ok(other?),
        }
    }

    async fn governed(
        &self,
        backend: &Arc<dyn GenerationBackend>,
        completion: CompletionRequest,
    ) -> Result<Result<CompletionOutput, BackendError>, GenerationError> {
        let backend = backend.clone();
        let result = self
            .governor
            .run(move || {
                let backend = backend.clone();
                let completion = completion.clone();
                async move { backend.complete(&completion).await }
            })
            .await?;
        Ok(result)
    }
}

fn decode<T: DeserializeOwned>(output: &CompletionOutput) -> Result<T, DecodeFailure> {
    match output {
        CompletionOutput::SchemaParsed(value) => {
            serde_json::from_value(value.clone()).map_err(|e| DecodeFailure {
                reason: format!("schema output has unexpected shape: {}", e),
                text: value.to_string(),
            })
        }
        CompletionOutput::RawText(text) => {
            let value = extract_json(text).map_err(|e| DecodeFailure {
                reason: e.to_string(),
                text: text.clone(),
            })?;
            serde_json::from_value(value).map_err(|e| DecodeFailure {
                reason: format!("JSON has unexpected shape: {}", e),
                text: text.clone(),
            })
        }
    }
}
