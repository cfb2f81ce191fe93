//! Chunked summarization
//!
//! Long material is cut into fixed-size slices, each slice is summarized on
//! its own, and the partial summaries are merged with one final call.

use super::error::GenerationError;
use super::structured::{GenerationRequest, StructuredGenerator};
use super::types::{summary_schema, SummaryLength, SummaryPayload};
use crate::governor::SpreadScheduler;

pub const DEFAULT_CHUNK_CHARS: usize = 8_000;

const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Contiguous slices of at most `chunk_chars` characters, split on char boundaries
pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<&str> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    for (count, (offset, _)) in text.char_indices().enumerate() {
        if count > 0 && count % chunk_chars == 0 {
            chunks.push(&text[start..offset]);
            start = offset;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

pub struct ChunkedSummaryPipeline<'a> {
    generator: &'a StructuredGenerator,
    spread: &'a SpreadScheduler,
    chunk_chars: usize,
}

impl<'a> ChunkedSummaryPipeline<'a> {
    pub fn new(
        generator: &'a StructuredGenerator,
        spread: &'a SpreadScheduler,
        chunk_chars: usize,
    ) -> Self {
        Self {
            generator,
            spread,
            chunk_chars,
        }
    }

    /// Summarize `text`, merging partial summaries when it spans several chunks
    pub async fn summarize(
        &self,
        text: &str,
        subject: &str,
        length: SummaryLength,
    ) -> Result<String, GenerationError> {
        let chunks = split_chunks(text, self.chunk_chars);
        if chunks.is_empty() {
            return Err(GenerationError::InvalidInput("nothing to summarize".to_string()));
        }

        let total_chars = text.chars().count();
        let pause = self.spread.chunk_pause(total_chars, chunks.len());
        tracing::info!(
            chunks = chunks.len(),
            total_chars,
            pause_ms = pause.as_millis() as u64,
            "summarizing material"
        );

        let mut partials = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let instruction = chunk_instruction(subject, length, index, chunks.len());
            let request = GenerationRequest::new(instruction, *chunk)
                .temperature(SUMMARY_TEMPERATURE)
                .schema(summary_schema());
            let payload: SummaryPayload = self.generator.generate(&request).await?;
            tracing::debug!(chunk = index + 1, of = chunks.len(), "partial summary ready");
            partials.push(payload.text.trim().to_string());
        }

        let joined = partials.join("\n\n");
        if partials.len() == 1 || !self.generator.is_configured() {
            return Ok(joined);
        }

        let request = GenerationRequest::new(merge_instruction(subject, length), joined)
            .temperature(SUMMARY_TEMPERATURE)
            .schema(summary_schema());
        let merged: SummaryPayload = self.generator.generate(&request).await?;
        Ok(merged.text.trim().to_string())
    }
}

fn subject_phrase(subject: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        "course".to_string()
    } else {
        subject.to_string()
    }
}

fn chunk_instruction(subject: &str, length: SummaryLength, index: usize, total: usize) -> String {
    let mut instruction = format!(
        "Summarize the following {} material for a student in about {} words. \
         Keep definitions, key facts and relationships. Return JSON: {{\"text\": \"...\"}}.",
        subject_phrase(subject),
        length.target_words()
    );
    if total > 1 {
        instruction.push_str(&format!(
            " This is part {} of {}; summarize only this part.",
            index + 1,
            total
        ));
    }
    instruction
}

fn merge_instruction(subject: &str, length: SummaryLength) -> String {
    format!(
        "The following are partial summaries of consecutive parts of one {} document. \
         Merge them into a single coherent summary of about {} words without repeating points. \
         Return JSON: {{\"text\": \"...\"}}.",
        subject_phrase(subject),
        length.target_words()
    )
}
