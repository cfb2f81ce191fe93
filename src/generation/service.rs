//! Study aid service
//!
//! Entry point for summary, flashcard and quiz generation. Caps input size,
//! applies spread pacing, routes to the model or to fallback heuristics, and
//! sanitizes model output before it reaches the caller.

use chrono::Utc;

use super::error::GenerationError;
use super::fallback;
use super::sanitize::{sanitize_cards, sanitize_questions};
use super::structured::{GenerationRequest, StructuredGenerator};
use super::summary::{ChunkedSummaryPipeline, DEFAULT_CHUNK_CHARS};
use super::types::{
    flashcard_schema, quiz_schema, FlashcardPayload, GeneratedArtifact, GenerationMode,
    GenerationOutcome, QuizPayload, SummaryLength,
};
use crate::governor::SpreadScheduler;

/// Upper bound on cards/questions per request
pub const MAX_ITEMS: usize = 50;

#[derive(Debug, Clone)]
pub struct StudySettings {
    /// Characters per summary chunk
    pub chunk_chars: usize,
    /// Input beyond this many characters is dropped
    pub max_input_chars: usize,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            chunk_chars: DEFAULT_CHUNK_CHARS,
            max_input_chars: 120_000,
        }
    }
}

/// Capped input
struct Material<'t> {
    text: &'t str,
    source_chars: usize,
    truncated: bool,
}

pub struct StudyService {
    generator: StructuredGenerator,
    spread: SpreadScheduler,
    settings: StudySettings,
}

impl StudyService {
    pub fn new(generator: StructuredGenerator, spread: SpreadScheduler, settings: StudySettings) -> Self {
        Self {
            generator,
            spread,
            settings,
        }
    }

    pub fn generator(&self) -> &StructuredGenerator {
        &self.generator
    }

    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }

    /// Summarize material, chunking long input
    pub async fn summarize(
        &self,
        text: &str,
        subject: &str,
        length: SummaryLength,
    ) -> Result<GenerationOutcome, GenerationError> {
        let material = self.prepare(text)?;

        if !self.generator.is_configured() {
            tracing::info!("no generation backend configured, using fallback summary");
            let text = fallback::summarize(material.text, length);
            return Ok(outcome(GeneratedArtifact::Summary { text }, GenerationMode::Fallback, &material));
        }

        let pipeline = ChunkedSummaryPipeline::new(&self.generator, &self.spread, self.settings.chunk_chars);
        let text = pipeline.summarize(material.text, subject, length).await?;
        if text.trim().is_empty() {
            return Err(GenerationError::ValidationFailed("model returned an empty summary".to_string()));
        }

        Ok(outcome(GeneratedArtifact::Summary { text }, GenerationMode::Model, &material))
    }

    /// Generate up to `count` flashcards
    pub async fn flashcards(
        &self,
        text: &str,
        subject: &str,
        count: usize,
    ) -> Result<GenerationOutcome, GenerationError> {
        let material = self.prepare(text)?;
        let count = count.clamp(1, MAX_ITEMS);

        if !self.generator.is_configured() {
            tracing::info!(count, "no generation backend configured, using fallback flashcards");
            let cards = fallback::flashcards(material.text, count);
            if cards.is_empty() {
                return Err(GenerationError::ValidationFailed(
                    "material yielded no flashcards".to_string(),
                ));
            }
            return Ok(outcome(GeneratedArtifact::FlashcardSet { cards }, GenerationMode::Fallback, &material));
        }

        self.pace(material.text.chars().count()).await;

        let instruction = format!(
            "Create exactly {} flashcards from the following {} material. \
             Each card needs a concise `front` (a question or term), an accurate `back`, \
             a `difficulty` of easy, medium or hard, and a few short lowercase `tags`. \
             Return JSON: {{\"cards\": [...]}}.",
            count,
            subject_phrase(subject)
        );
        let request = GenerationRequest::new(instruction, material.text)
            .temperature(0.4)
            .schema(flashcard_schema());
        let payload: FlashcardPayload = self.generator.generate(&request).await?;
        let cards = sanitize_cards(payload.cards, count)?;

        Ok(outcome(GeneratedArtifact::FlashcardSet { cards }, GenerationMode::Model, &material))
    }

    /// Generate up to `count` multiple-choice questions
    pub async fn quiz(
        &self,
        text: &str,
        subject: &str,
        count: usize,
    ) -> Result<GenerationOutcome, GenerationError> {
        let material = self.prepare(text)?;
        let count = count.clamp(1, MAX_ITEMS);

        if !self.generator.is_configured() {
            tracing::info!(count, "no generation backend configured, using fallback quiz");
            let questions = fallback::quiz(material.text, count);
            if questions.is_empty() {
                return Err(GenerationError::ValidationFailed(
                    "material yielded no quiz questions".to_string(),
                ));
            }
            return Ok(outcome(GeneratedArtifact::QuizSet { questions }, GenerationMode::Fallback, &material));
        }

        self.pace(material.text.chars().count()).await;

        let instruction = format!(
            "Write {} multiple-choice questions that test understanding of the following {} material. \
             Every question has exactly 4 `options`, a 0-based `correctIndex` and a one-sentence \
             `explanation`. Do not repeat questions. Return JSON: {{\"questions\": [...]}}.",
            count,
            subject_phrase(subject)
        );
        let request = GenerationRequest::new(instruction, material.text)
            .temperature(0.5)
            .schema(quiz_schema());
        let payload: QuizPayload = self.generator.generate(&request).await?;
        let questions = sanitize_questions(payload.questions, count)?;

        Ok(outcome(GeneratedArtifact::QuizSet { questions }, GenerationMode::Model, &material))
    }

    fn prepare<'t>(&self, text: &'t str) -> Result<Material<'t>, GenerationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::InvalidInput("no text provided".to_string()));
        }

        let source_chars = text.chars().count();
        let max = self.settings.max_input_chars.max(1);
        if source_chars <= max {
            return Ok(Material {
                text,
                source_chars,
                truncated: false,
            });
        }

        let cut = text.char_indices().nth(max).map_or(text.len(), |(i, _)| i);
        tracing::warn!(source_chars, max, "input exceeds cap, truncating");
        Ok(Material {
            text: &text[..cut],
            source_chars,
            truncated: true,
        })
    }

    /// Up-front spread delay for single-call generations
    async fn pace(&self, chars: usize) {
        let delay = self.spread.compute_delay(chars);
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, chars, "pacing large request");
            tokio::time::sleep(delay).await;
        }
    }
}

fn outcome(artifact: GeneratedArtifact, mode: GenerationMode, material: &Material<'_>) -> GenerationOutcome {
    GenerationOutcome {
        artifact,
        mode,
        source_chars: material.source_chars,
        truncated: material.truncated,
        generated_at: Utc::now(),
    }
}

fn subject_phrase(subject: &str) -> &str {
    match subject.trim() {
        "" => "course",
        s => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::generation::backend::mock::ScriptedBackend;
    use crate::generation::backend::{CompletionOutput, GenerationBackend};
    use crate::generation::structured::GeneratorSettings;
    use crate::governor::{GovernorConfig, RequestGovernor, SpreadConfig};

    const MATERIAL: &str = "Enzymes accelerate biochemical reactions without being consumed. \
        Temperature and acidity influence enzymatic activity considerably. \
        Substrates bind at the active site of the enzyme molecule.";

    fn service(backend: Option<Arc<dyn GenerationBackend>>, settings: StudySettings) -> StudyService {
        let generator = StructuredGenerator::new(
            backend,
            RequestGovernor::new(GovernorConfig::default()),
            GeneratorSettings::default(),
        );
        StudyService::new(generator, SpreadScheduler::new(SpreadConfig::default()), settings)
    }

    #[tokio::test]
    async fn test_fallback_flashcards_bounded_by_count() {
        let service = service(None, StudySettings::default());

        for n in [1, 2, 5] {
            let outcome = service.flashcards(MATERIAL, "biology", n).await.unwrap();
            assert_eq!(outcome.mode, GenerationMode::Fallback);
            match outcome.artifact {
                GeneratedArtifact::FlashcardSet { cards } => {
                    assert!(!cards.is_empty());
                    assert!(cards.len() <= n);
                }
                other => panic!("unexpected artifact: {:?}", other),
            }
        }
        assert_eq!(service.generator().queue_stats().pending, 0);
    }

    #[tokio::test]
    async fn test_fallback_is_deterministic() {
        let service = service(None, StudySettings::default());
        let a = service.quiz(MATERIAL, "", 2).await.unwrap();
        let b = service.quiz(MATERIAL, "", 2).await.unwrap();
        assert_eq!(a.artifact, b.artifact);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let service = service(None, StudySettings::default());
        let err = service.summarize("   \n ", "", SummaryLength::Short).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_input_is_capped() {
        let service = service(
            None,
            StudySettings {
                max_input_chars: 40,
                ..StudySettings::default()
            },
        );
        let outcome = service.summarize(MATERIAL, "", SummaryLength::Short).await.unwrap();
        assert!(outcome.truncated);
        assert_eq!(outcome.source_chars, MATERIAL.chars().count());
    }

    #[tokio::test]
    async fn test_fallback_quiz_on_symbols_is_not_empty() {
        let service = service(None, StudySettings::default());

        let outcome = service.quiz("--- *** ---", "", 3).await.unwrap();

        match outcome.artifact {
            GeneratedArtifact::QuizSet { questions } => assert_eq!(questions.len(), 1),
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_uses_capped_size() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(CompletionOutput::SchemaParsed(json!({
            "cards": [{ "front": "Enzymes", "back": "Catalysts", "difficulty": "easy" }]
        })))]));
        let service = service(
            Some(backend as Arc<dyn GenerationBackend>),
            StudySettings {
                max_input_chars: 10_000,
                ..StudySettings::default()
            },
        );
        // Far past the spread threshold before the cap, below it after
        let material = MATERIAL.repeat(400);

        let start = tokio::time::Instant::now();
        let outcome = service.flashcards(&material, "", 1).await.unwrap();

        assert!(outcome.truncated);
        assert!(start.elapsed() < Duration::from_secs(1), "paced for {:?}", start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_quiz_is_sanitized() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(CompletionOutput::SchemaParsed(json!({
            "questions": [
                { "question": "What do enzymes do?", "options": ["a", "b", "c", "d"], "correctIndex": 0, "explanation": "x" },
                { "question": "what do  ENZYMES do?", "options": ["a", "b", "c", "d"], "correctIndex": 1, "explanation": "y" },
                { "question": "Where do substrates bind?", "options": ["a", "b", "c"], "correctIndex": 1, "explanation": "z" }
            ]
        })))]));
        let service = service(Some(backend.clone() as Arc<dyn GenerationBackend>), StudySettings::default());

        let outcome = service.quiz(MATERIAL, "biology", 5).await.unwrap();

        assert_eq!(outcome.mode, GenerationMode::Model);
        match outcome.artifact {
            GeneratedArtifact::QuizSet { questions } => {
                assert_eq!(questions.len(), 1);
                assert_eq!(questions[0].question, "What do enzymes do?");
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
        assert!(backend.requests.lock()[0].user_prompt.contains("biology"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_flashcards_without_valid_cards_fail() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(CompletionOutput::RawText(
            "```json\n{\"cards\": [{\"front\": \"\", \"back\": \"\"}]}\n```".to_string(),
        ))]));
        let service = service(Some(backend as Arc<dyn GenerationBackend>), StudySettings::default());

        let err = service.flashcards(MATERIAL, "", 3).await.unwrap_err();
        assert!(matches!(err, GenerationError::ValidationFailed(_)));
    }
}
