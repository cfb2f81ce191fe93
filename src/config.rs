//! Configuration management for Lectern Server

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::extraction::ocr::{OcrProvider, OcrServiceConfig};
use crate::extraction::PdfExtractionSettings;
use crate::generation::{GeneratorSettings, StudySettings};
use crate::governor::{GovernorConfig, QueueConfig, RateWindowConfig, RetryPolicy, SpreadConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Missing required variable {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub governor: GovernorSettings,
    pub pipeline: PipelineConfig,
    pub extraction: ExtractionConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    OpenAi,
    Ollama,
    /// No upstream; fallback heuristics only
    None,
}

impl GenerationProvider {
    /// Model used when `GENERATION_MODEL` is unset
    pub fn default_model(self) -> &'static str {
        match self {
            GenerationProvider::Ollama => "llama3.1",
            GenerationProvider::OpenAi | GenerationProvider::None => "gpt-4o-mini",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernorSettings {
    pub requests_per_minute: usize,
    pub concurrency: usize,
    pub max_pending: usize,
    pub retries: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub chunk_chars: usize,
    pub max_input_chars: usize,
    pub spread_enabled: bool,
    pub spread_min_chars: usize,
    pub spread_max_chars: usize,
    pub spread_max_delay_ms: u64,
    pub fixed_pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub min_native_chars: usize,
    pub max_ocr_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub providers: Vec<OcrProvider>,
    pub ollama_url: String,
    pub ollama_model: String,
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_upload_bytes: 20 * 1024 * 1024,
            },
            generation: GenerationConfig {
                provider: GenerationProvider::None,
                base_url: None,
                api_key: None,
                model: GenerationProvider::None.default_model().to_string(),
                max_tokens: 2048,
                max_attempts: 3,
            },
            governor: GovernorSettings {
                requests_per_minute: 15,
                concurrency: 2,
                max_pending: 256,
                retries: 4,
                base_delay_ms: 500,
            },
            pipeline: PipelineConfig {
                chunk_chars: 8_000,
                max_input_chars: 120_000,
                spread_enabled: true,
                spread_min_chars: 12_000,
                spread_max_chars: 120_000,
                spread_max_delay_ms: 20_000,
                fixed_pause_ms: 1_000,
            },
            extraction: ExtractionConfig {
                min_native_chars: 100,
                max_ocr_pages: 30,
            },
            ocr: OcrConfig {
                providers: vec![OcrProvider::Tesseract, OcrProvider::Ollama],
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
                language: "eng".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; unset keys keep their defaults
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match var("GENERATION_PROVIDER").as_deref() {
            None | Some("none") => GenerationProvider::None,
            Some("openai") => GenerationProvider::OpenAi,
            Some("ollama") => GenerationProvider::Ollama,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "GENERATION_PROVIDER",
                    value: other.to_string(),
                })
            }
        };
        let api_key = var("GENERATION_API_KEY");
        if provider == GenerationProvider::OpenAi && api_key.is_none() {
            return Err(ConfigError::Missing("GENERATION_API_KEY"));
        }

        let ocr_providers = match var("OCR_PROVIDERS") {
            None => d.ocr.providers.clone(),
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    OcrProvider::parse(s).ok_or_else(|| ConfigError::Invalid {
                        key: "OCR_PROVIDERS",
                        value: s.trim().to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or(d.server.host),
                port: parsed(&var, "SERVER_PORT", d.server.port)?,
                max_upload_bytes: parsed(&var, "SERVER_MAX_UPLOAD_BYTES", d.server.max_upload_bytes)?,
            },
            generation: GenerationConfig {
                provider,
                base_url: var("GENERATION_BASE_URL"),
                api_key,
                model: var("GENERATION_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
                max_tokens: parsed(&var, "GENERATION_MAX_TOKENS", d.generation.max_tokens)?,
                max_attempts: parsed(&var, "GENERATION_MAX_ATTEMPTS", d.generation.max_attempts)?,
            },
            governor: GovernorSettings {
                requests_per_minute: parsed(&var, "GOVERNOR_REQUESTS_PER_MINUTE", d.governor.requests_per_minute)?,
                concurrency: parsed(&var, "GOVERNOR_CONCURRENCY", d.governor.concurrency)?,
                max_pending: parsed(&var, "GOVERNOR_MAX_PENDING", d.governor.max_pending)?,
                retries: parsed(&var, "GOVERNOR_RETRIES", d.governor.retries)?,
                base_delay_ms: parsed(&var, "GOVERNOR_BASE_DELAY_MS", d.governor.base_delay_ms)?,
            },
            pipeline: PipelineConfig {
                chunk_chars: parsed(&var, "PIPELINE_CHUNK_CHARS", d.pipeline.chunk_chars)?,
                max_input_chars: parsed(&var, "PIPELINE_MAX_INPUT_CHARS", d.pipeline.max_input_chars)?,
                spread_enabled: parsed(&var, "PIPELINE_SPREAD_ENABLED", d.pipeline.spread_enabled)?,
                spread_min_chars: parsed(&var, "PIPELINE_SPREAD_MIN_CHARS", d.pipeline.spread_min_chars)?,
                spread_max_chars: parsed(&var, "PIPELINE_SPREAD_MAX_CHARS", d.pipeline.spread_max_chars)?,
                spread_max_delay_ms: parsed(&var, "PIPELINE_SPREAD_MAX_DELAY_MS", d.pipeline.spread_max_delay_ms)?,
                fixed_pause_ms: parsed(&var, "PIPELINE_FIXED_PAUSE_MS", d.pipeline.fixed_pause_ms)?,
            },
            extraction: ExtractionConfig {
                min_native_chars: parsed(&var, "EXTRACTION_MIN_NATIVE_CHARS", d.extraction.min_native_chars)?,
                max_ocr_pages: parsed(&var, "EXTRACTION_MAX_OCR_PAGES", d.extraction.max_ocr_pages)?,
            },
            ocr: OcrConfig {
                providers: ocr_providers,
                ollama_url: var("OCR_OLLAMA_URL").unwrap_or(d.ocr.ollama_url),
                ollama_model: var("OCR_OLLAMA_MODEL").unwrap_or(d.ocr.ollama_model),
                language: var("OCR_LANGUAGE").unwrap_or(d.ocr.language),
            },
        })
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            queue: QueueConfig {
                concurrency: self.governor.concurrency,
                max_pending: self.governor.max_pending,
            },
            rate: RateWindowConfig::per_minute(self.governor.requests_per_minute),
            retry: RetryPolicy::new(
                self.governor.retries,
                Duration::from_millis(self.governor.base_delay_ms),
            ),
        }
    }

    pub fn spread_config(&self) -> SpreadConfig {
        SpreadConfig {
            enabled: self.pipeline.spread_enabled,
            min_chars: self.pipeline.spread_min_chars,
            max_chars: self.pipeline.spread_max_chars,
            max_delay: Duration::from_millis(self.pipeline.spread_max_delay_ms),
            fixed_pause: Duration::from_millis(self.pipeline.fixed_pause_ms),
        }
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            model: self.generation.model.clone(),
            max_tokens: self.generation.max_tokens,
            max_attempts: self.generation.max_attempts.max(1),
        }
    }

    pub fn study_settings(&self) -> StudySettings {
        StudySettings {
            chunk_chars: self.pipeline.chunk_chars.max(1),
            max_input_chars: self.pipeline.max_input_chars,
        }
    }

    pub fn pdf_settings(&self) -> PdfExtractionSettings {
        PdfExtractionSettings {
            min_native_chars: self.extraction.min_native_chars,
            max_ocr_pages: self.extraction.max_ocr_pages,
            max_bytes: self.server.max_upload_bytes,
        }
    }

    pub fn ocr_config(&self) -> OcrServiceConfig {
        OcrServiceConfig {
            providers: self.ocr.providers.clone(),
            ollama_url: self.ocr.ollama_url.clone(),
            ollama_model: self.ocr.ollama_model.clone(),
            default_language: self.ocr.language.clone(),
        }
    }
}

fn parsed<T, V>(var: &V, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
