//! Generation backends
//!
//! Defines the backend trait and implementations for upstream
//! text-generation services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::governor::Retryable;

/// A single upstream completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema the response should conform to, if schema mode is wanted
    pub response_schema: Option<Value>,
}

impl CompletionRequest {
    /// Same request in unconstrained text mode
    pub fn without_schema(&self) -> Self {
        Self {
            response_schema: None,
            ..self.clone()
        }
    }
}

/// What the backend handed back
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutput {
    /// Schema mode succeeded and the backend returned a parsed value
    SchemaParsed(Value),
    /// Free text that still needs tolerant JSON extraction
    RawText(String),
}

/// Backend error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Upstream rate limit hit (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Backend does not support schema-constrained output: {0}")]
    SchemaUnsupported(String),

    #[error("Upstream returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to reach upstream: {0}")]
    Transport(String),

    #[error("Unexpected upstream response: {0}")]
    InvalidResponse(String),
}

impl Retryable for BackendError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, BackendError::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Upstream text-generation backend
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short name for logs and health output
    fn name(&self) -> &'static str;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool;

    /// Run one completion
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutput, BackendError>;
}

/// Error bodies that blame the OpenAI `response_format` parameter
const OPENAI_SCHEMA_NEEDLES: &[&str] = &["response_format", "json_schema"];
/// Ollama names its structured-output parameter plainly `format`
const OLLAMA_SCHEMA_NEEDLES: &[&str] = &["format"];

/// Map a non-success HTTP response to a backend error
///
/// `schema_needles` is `None` when the request carried no schema, so a 400
/// can only mean schema mode was rejected when schema mode was asked for.
async fn error_from_response(
    response: reqwest::Response,
    schema_needles: Option<&[&str]>,
) -> BackendError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return BackendError::RateLimited { retry_after };
    }

    let body = response.text().await.unwrap_or_default();
    if is_schema_rejection(status, &body, schema_needles) {
        return BackendError::SchemaUnsupported(body);
    }

    BackendError::Api {
        status: status.as_u16(),
        body,
    }
}

fn is_schema_rejection(status: StatusCode, body: &str, schema_needles: Option<&[&str]>) -> bool {
    let Some(needles) = schema_needles else {
        return false;
    };
    if status != StatusCode::BAD_REQUEST {
        return false;
    }
    let body = body.to_lowercase();
    needles.iter().any(|needle| body.contains(needle))
}

/// Schema-mode content parses as JSON; everything else is raw text
fn classify_content(content: String, schema_requested: bool) -> CompletionOutput {
    if schema_requested {
        if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
            return CompletionOutput::SchemaParsed(value);
        }
    }
    CompletionOutput::RawText(content)
}

/// OpenAI-compatible chat completions backend
pub struct OpenAiBackend {
    client: reqwest::Client,
    /// API base URL (e.g., "https://api.openai.com/v1")
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
        });

        if let Some(schema) = &request.response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "study_aid",
                    "schema": schema,
                    "strict": false,
                },
            });
        }

        body
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutput, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let needles = request.response_schema.is_some().then_some(OPENAI_SCHEMA_NEEDLES);
            return Err(error_from_response(response, needles).await);
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BackendError::InvalidResponse("missing choices[0].message.content".to_string()))?
            .to_string();

        Ok(classify_content(content, request.response_schema.is_some()))
    }
}

/// Ollama chat backend (local LLM)
pub struct OllamaBackend {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn default_url() -> Self {
        Self::new("http://localhost:11434")
    }

    fn body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        if let Some(schema) = &request.response_schema {
            body["format"] = schema.clone();
        }

        body
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutput, BackendError> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let needles = request.response_schema.is_some().then_some(OLLAMA_SCHEMA_NEEDLES);
            return Err(error_from_response(response, needles).await);
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let content = result["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(classify_content(content, request.response_schema.is_some()))
    }
}

/// Scripted backend for tests
#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Replays queued responses; falls back to `default` when the script runs out
    pub struct ScriptedBackend {
        script: Mutex<VecDeque<Result<CompletionOutput, BackendError>>>,
        default: Option<CompletionOutput>,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(script: Vec<Result<CompletionOutput, BackendError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                default: None,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn always(output: CompletionOutput) -> Self {
            Self {
                default: Some(output),
                ..Self::new(Vec::new())
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutput, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());
            match self.script.lock().pop_front() {
                Some(next) => next,
                None => self
                    .default
                    .clone()
                    .ok_or_else(|| BackendError::InvalidResponse("script exhausted".to_string())),
            }
        }
    }
}
