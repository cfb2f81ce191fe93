//! Sanitization of model payloads
//!
//! Drops invalid or duplicate items, clamps out-of-range values, and fails
//! only when nothing usable remains.

use std::collections::{BTreeSet, HashSet};

use super::error::GenerationError;
use super::types::{Card, Difficulty, Question, RawCard, RawQuestion};

const MAX_TAGS: usize = 8;
const DEFAULT_EXPLANATION: &str = "No explanation provided.";

/// Lowercase with internal whitespace collapsed, for duplicate detection
pub fn normalize_key(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `limit` valid, unique questions
///
/// A question is valid when it has text, at least four non-empty options and
/// an answer key naming one of the first four of them. Blank options are
/// skipped and the answer key is re-pointed at the same option afterwards; a
/// question whose answer is blank, missing or cut off is dropped.
pub fn sanitize_questions(
    raw: Vec<RawQuestion>,
    limit: usize,
) -> Result<Vec<Question>, GenerationError> {
    let total = raw.len();
    let mut seen = HashSet::new();
    let mut questions = Vec::new();

    for item in raw {
        if questions.len() >= limit {
            break;
        }

        let question = clean(&item.question);
        if question.is_empty() || !seen.insert(normalize_key(&question)) {
            continue;
        }

        let Some((options, correct_index)) = kept_options(&item) else {
            // Let a later duplicate with a usable answer key through
            seen.remove(&normalize_key(&question));
            continue;
        };

        let explanation = item
            .explanation
            .as_deref()
            .map(clean)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

        questions.push(Question {
            question,
            options,
            correct_index,
            explanation,
        });
    }

    if questions.is_empty() {
        return Err(GenerationError::ValidationFailed(format!(
            "quiz contained no valid questions ({} generated)",
            total
        )));
    }

    tracing::debug!(kept = questions.len(), total, "sanitized quiz questions");
    Ok(questions)
}

/// First four non-blank options and the position of the answer among them
fn kept_options(item: &RawQuestion) -> Option<([String; 4], u8)> {
    let answer = usize::try_from(item.correct_index?).ok()?;

    let mut options = Vec::with_capacity(4);
    let mut correct = None;
    for (i, option) in item.options.iter().enumerate() {
        let option = clean(option);
        if option.is_empty() {
            continue;
        }
        if options.len() == 4 {
            break;
        }
        if i == answer {
            correct = Some(options.len() as u8);
        }
        options.push(option);
    }

    let options = <[String; 4]>::try_from(options).ok()?;
    Some((options, correct?))
}

/// Keep at most `limit` valid, unique flashcards
pub fn sanitize_cards(raw: Vec<RawCard>, limit: usize) -> Result<Vec<Card>, GenerationError> {
    let total = raw.len();
    let mut seen = HashSet::new();
    let mut cards = Vec::new();

    for item in raw {
        if cards.len() >= limit {
            break;
        }

        let front = clean(&item.front);
        let back = clean(&item.back);
        if front.is_empty() || back.is_empty() || !seen.insert(normalize_key(&front)) {
            continue;
        }

        let difficulty = item
            .difficulty
            .as_deref()
            .and_then(Difficulty::parse)
            .unwrap_or_default();

        let tags: BTreeSet<String> = item
            .tags
            .iter()
            .map(|t| normalize_key(t))
            .filter(|t| !t.is_empty())
            .take(MAX_TAGS)
            .collect();

        cards.push(Card {
            front,
            back,
            difficulty,
            tags,
        });
    }

    if cards.is_empty() {
        return Err(GenerationError::ValidationFailed(format!(
            "flashcard set contained no valid cards ({} generated)",
            total
        )));
    }

    tracing::debug!(kept = cards.len(), total, "sanitized flashcards");
    Ok(cards)
}
