//! Study aid types
//!
//! Defines the artifacts produced for callers and the looser payload shapes
//! models are asked to return.

use std::collections::BTreeSet;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Flashcard difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Lenient parse; unknown labels map to `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "simple" | "beginner" => Some(Self::Easy),
            "medium" | "moderate" | "intermediate" => Some(Self::Medium),
            "hard" | "difficult" | "advanced" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// One flashcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub front: String,
    pub back: String,
    pub difficulty: Difficulty,
    pub tags: BTreeSet<String>,
}

/// One multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: [String; 4],
    /// Index into `options`, always 0..=3
    pub correct_index: u8,
    pub explanation: String,
}

/// Output contract of the generation core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedArtifact {
    Summary { text: String },
    FlashcardSet { cards: Vec<Card> },
    QuizSet { questions: Vec<Question> },
}

/// How an artifact was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Generated by the configured model backend
    Model,
    /// Degraded local heuristics (no backend configured)
    Fallback,
}

/// Artifact plus provenance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub artifact: GeneratedArtifact,
    pub mode: GenerationMode,
    pub source_chars: usize,
    pub truncated: bool,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Target summary length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    /// Approximate word budget handed to the model
    pub fn target_words(self) -> usize {
        match self {
            Self::Short => 150,
            Self::Medium => 350,
            Self::Long => 700,
        }
    }

    /// Sentences kept by the fallback summarizer
    pub fn fallback_sentences(self) -> usize {
        match self {
            Self::Short => 3,
            Self::Medium => 6,
            Self::Long => 10,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" | "brief" => Some(Self::Short),
            "medium" | "normal" => Some(Self::Medium),
            "long" | "detailed" => Some(Self::Long),
            _ => None,
        }
    }
}

// ============================================================================
// Model payloads
// ============================================================================

/// Summary as returned by the model
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryPayload {
    #[serde(alias = "summary")]
    pub text: String,
}

/// Flashcards as returned by the model, before sanitization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlashcardPayload {
    #[serde(default, alias = "flashcards")]
    pub cards: Vec<RawCard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCard {
    #[serde(default, alias = "question", alias = "term")]
    pub front: String,
    #[serde(default, alias = "answer", alias = "definition")]
    pub back: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Quiz as returned by the model, before sanitization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizPayload {
    #[serde(default)]
    pub questions: Vec<RawQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// `None` when absent or unreadable; such questions have no answer key
    #[serde(
        default,
        alias = "correctIndex",
        alias = "answerIndex",
        alias = "answer_index",
        deserialize_with = "lenient_index"
    )]
    pub correct_index: Option<i64>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Accepts `2`, `2.0` and `"2"`; anything else reads as no index
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Int(i64),
        Float(f64),
        Text(String),
        Other(IgnoredAny),
    }

    Ok(match Option::<Index>::deserialize(deserializer)? {
        Some(Index::Int(i)) => Some(i),
        Some(Index::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        Some(Index::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Response schemas
// ============================================================================

pub fn summary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": { "type": "string" }
        },
        "required": ["text"]
    })
}

pub fn flashcard_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cards": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "front": { "type": "string" },
                        "back": { "type": "string" },
                        "difficulty": { "type": "string", "enum": ["easy", "medium", "hard"] },
                        "tags": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["front", "back", "difficulty"]
                }
            }
        },
        "required": ["cards"]
    })
}

pub fn quiz_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question": { "type": "string" },
                        "options": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": 4,
                            "maxItems": 4
                        },
                        "correctIndex": { "type": "integer", "minimum": 0, "maximum": 3 },
                        "explanation": { "type": "string" }
                    },
                    "required": ["question", "options", "correctIndex", "explanation"]
                }
            }
        },
        "required": ["questions"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("EASY"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse(" advanced "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("impossible"), None);
    }

    #[test]
    fn test_raw_question_accepts_camel_case() {
        let raw: RawQuestion = serde_json::from_value(json!({
            "question": "Q?",
            "options": ["a", "b", "c", "d"],
            "correctIndex": 2
        }))
        .unwrap();
        assert_eq!(raw.correct_index, Some(2));
        assert!(raw.explanation.is_none());
    }

    #[test]
    fn test_raw_question_index_is_lenient() {
        let payload: QuizPayload = serde_json::from_value(json!({
            "questions": [
                { "question": "A?", "options": ["a", "b", "c", "d"], "correctIndex": "2" },
                { "question": "B?", "options": ["a", "b", "c", "d"], "correctIndex": 1.0 },
                { "question": "C?", "options": ["a", "b", "c", "d"] },
                { "question": "D?", "options": ["a", "b", "c", "d"], "correctIndex": "second" },
                { "question": "E?", "options": ["a", "b", "c", "d"], "correctIndex": null }
            ]
        }))
        .unwrap();

        let indices: Vec<Option<i64>> = payload.questions.iter().map(|q| q.correct_index).collect();
        assert_eq!(indices, vec![Some(2), Some(1), None, None, None]);
    }

    #[test]
    fn test_artifact_serializes_with_tag() {
        let artifact = GeneratedArtifact::Summary {
            text: "hi".to_string(),
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value, json!({ "type": "summary", "text": "hi" }));
    }

    #[test]
    fn test_summary_payload_alias() {
        let payload: SummaryPayload = serde_json::from_value(json!({ "summary": "x" })).unwrap();
        assert_eq!(payload.text, "x");
    }
}
