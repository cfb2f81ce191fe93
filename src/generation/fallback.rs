//! Heuristic study aids for when no model backend is configured
//!
//! Output is deterministic for a given input and never touches the network.
//! Results are marked as fallback output by the caller.

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::types::{Card, Difficulty, Question, SummaryLength};

/// Words shorter than this are not treated as key terms
const KEY_TERM_MIN_CHARS: usize = 7;
/// Sentences shorter than this are treated as noise (headings, page numbers)
const MIN_SENTENCE_CHARS: usize = 20;
const BLANK: &str = "_____";
const PADDING_OPTIONS: [&str; 3] = ["None of these", "All of these", "Not stated in the material"];

/// Leading sentences of the material
pub fn summarize(text: &str, length: SummaryLength) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return text.chars().take(600).collect::<String>().trim().to_string();
    }

    sentences
        .into_iter()
        .take(length.fallback_sentences())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most frequent long words, paired with generic definitions
pub fn flashcards(text: &str, n: usize) -> Vec<Card> {
    let n = n.max(1);
    let sentences = split_sentences(text);

    let mut terms = ranked_terms(text, KEY_TERM_MIN_CHARS);
    if terms.is_empty() {
        terms = ranked_terms(text, 4);
    }

    let mut cards: Vec<Card> = terms
        .into_iter()
        .take(n)
        .map(|(term, count)| {
            let context = sentences
                .iter()
                .find(|s| s.to_lowercase().contains(&term))
                .map(|s| format!(" Context: \"{}\"", s))
                .unwrap_or_default();

            Card {
                front: format!("What does \"{}\" refer to in this material?", term),
                back: format!(
                    "A key term of this material, mentioned {} time(s).{}",
                    count, context
                ),
                difficulty: difficulty_for(&term),
                tags: BTreeSet::from(["auto-generated".to_string()]),
            }
        })
        .collect();

    if cards.is_empty() && !text.trim().is_empty() {
        cards.push(Card {
            front: "What is the main idea of this material?".to_string(),
            back: text.trim().chars().take(200).collect(),
            difficulty: Difficulty::Easy,
            tags: BTreeSet::from(["auto-generated".to_string()]),
        });
    }

    cards
}

/// Fill-in-the-blank questions from sampled sentences
///
/// Sampling is seeded from the SHA-256 of the text, so the same material
/// always yields the same quiz.
pub fn quiz(text: &str, n: usize) -> Vec<Question> {
    let n = n.max(1);
    let mut rng = StdRng::from_seed(seed_for(text));

    let vocabulary: Vec<String> = ranked_terms(text, 6).into_iter().map(|(t, _)| t).collect();
    let mut candidates: Vec<String> = split_sentences(text)
        .into_iter()
        .filter(|s| longest_word(s).is_some_and(|w| w.chars().count() >= 6))
        .collect();
    candidates.shuffle(&mut rng);

    let mut questions: Vec<Question> = candidates
        .into_iter()
        .take(n)
        .filter_map(|sentence| blank_question(&sentence, &vocabulary, &mut rng))
        .collect();

    if questions.is_empty() {
        // Symbol-only material has no clean word; quote its first token as is
        let word = text
            .split_whitespace()
            .map(clean_word)
            .find(|w| !w.is_empty())
            .or_else(|| text.split_whitespace().next());
        if let Some(word) = word {
            questions.push(Question {
                question: "Which of these words appears in the material?".to_string(),
                options: [
                    word.to_lowercase(),
                    PADDING_OPTIONS[0].to_string(),
                    PADDING_OPTIONS[1].to_string(),
                    PADDING_OPTIONS[2].to_string(),
                ],
                correct_index: 0,
                explanation: format!("\"{}\" is the first word of the material.", word),
            });
        }
    }

    questions
}

fn blank_question(sentence: &str, vocabulary: &[String], rng: &mut StdRng) -> Option<Question> {
    let answer_token = longest_word(sentence)?;
    let answer = answer_token.to_lowercase();

    let mut blanked = false;
    let stem = sentence
        .split_whitespace()
        .map(|token| {
            if !blanked && clean_word(token) == answer_token {
                blanked = true;
                token.replacen(answer_token, BLANK, 1)
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let pool: Vec<&String> = vocabulary.iter().filter(|w| **w != answer).collect();
    let mut distractors: Vec<String> = pool
        .choose_multiple(rng, 3)
        .map(|w| (*w).clone())
        .collect();
    for padding in PADDING_OPTIONS {
        if distractors.len() >= 3 {
            break;
        }
        distractors.push(padding.to_string());
    }

    let correct = rng.gen_range(0..4usize);
    let mut options = distractors;
    options.insert(correct, answer.clone());
    let options: [String; 4] = options.try_into().ok()?;

    Some(Question {
        question: format!("Fill in the blank: {}", stem),
        options,
        correct_index: correct as u8,
        explanation: format!("The material states: \"{}\"", sentence),
    })
}

/// Sentences in reading order, whitespace-normalized
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        if word.ends_with(['.', '!', '?']) {
            push_sentence(&mut sentences, std::mem::take(&mut current));
        }
    }
    push_sentence(&mut sentences, current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, sentence: String) {
    if sentence.chars().count() >= MIN_SENTENCE_CHARS {
        sentences.push(sentence);
    }
}

/// Lowercased words of at least `min_chars`, by frequency then alphabetically
fn ranked_terms(text: &str, min_chars: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in text.split_whitespace() {
        let word = clean_word(token);
        if word.chars().count() >= min_chars && word.chars().all(char::is_alphabetic) {
            *counts.entry(word.to_lowercase()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn longest_word(sentence: &str) -> Option<&str> {
    sentence
        .split_whitespace()
        .map(clean_word)
        .filter(|w| w.chars().all(char::is_alphabetic))
        .fold(None, |best: Option<&str>, w| match best {
            Some(b) if b.chars().count() >= w.chars().count() => Some(b),
            _ if w.is_empty() => best,
            _ => Some(w),
        })
}

fn clean_word(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

fn difficulty_for(term: &str) -> Difficulty {
    match term.chars().count() {
        0..=8 => Difficulty::Easy,
        9..=11 => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}

fn seed_for(text: &str) -> [u8; 32] {
    Sha256::digest(text.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATERIAL: &str = "Photosynthesis converts light energy into chemical energy. \
        Chloroplasts contain chlorophyll, which absorbs light. \
        The Calvin cycle fixes carbon dioxide into sugars. \
        Photosynthesis happens mainly in the leaves of plants. \
        Respiration releases the energy stored by photosynthesis.";

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First sentence is here. Tiny!\n3. Third   sentence\nhere?");
        assert_eq!(
            sentences,
            vec![
                "First sentence is here.".to_string(),
                "Third sentence here?".to_string(),
            ]
        );
    }

    #[test]
    fn test_summary_takes_leading_sentences() {
        let summary = summarize(MATERIAL, SummaryLength::Short);
        assert!(summary.starts_with("Photosynthesis converts light energy"));
        assert_eq!(split_sentences(&summary).len(), 3);
    }

    #[test]
    fn test_flashcards_bounded_and_ranked() {
        let cards = flashcards(MATERIAL, 2);
        assert_eq!(cards.len(), 2);
        assert!(cards[0].front.contains("photosynthesis"));
        assert!(cards[0].back.contains("3 time(s)"));
        assert!(cards.iter().all(|c| c.tags.contains("auto-generated")));
    }

    #[test]
    fn test_flashcards_never_empty_for_text() {
        let cards = flashcards("ok go", 5);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].back, "ok go");
    }

    #[test]
    fn test_quiz_is_deterministic() {
        let first = quiz(MATERIAL, 3);
        let second = quiz(MATERIAL, 3);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);

        for question in &first {
            assert!(question.question.contains(BLANK));
            assert!(question.correct_index < 4);
            let answer = &question.options[question.correct_index as usize];
            let unique: BTreeSet<&String> = question.options.iter().collect();
            assert_eq!(unique.len(), 4, "duplicate options in {:?}", question.options);
            assert!(question.explanation.to_lowercase().contains(answer.as_str()));
        }
    }

    #[test]
    fn test_quiz_without_sentences_still_answers() {
        let questions = quiz("tiny", 4);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].options[0], "tiny");
    }

    #[test]
    fn test_quiz_from_symbols_only() {
        let questions = quiz("--- *** ---", 3);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].options[questions[0].correct_index as usize], "---");
    }
}
