//! Topic labeling over fixed-size chunk batches.
//!
//! Consecutive chunks are grouped into non-overlapping batches and each batch
//! gets one short title from a [`TextGenerator`]. A failed call never aborts
//! the run: the batch is labeled [`FALLBACK_TOPIC`] and the failure reason is
//! kept in its [`BatchOutcome`].
use std::sync::Arc;

use crate::config::{ChunkingSettings, ModelSettings};
use crate::traits::TextGenerator;
use crate::types::{BatchOutcome, Chunk, LabeledChunks, FALLBACK_TOPIC};

const LABEL_PROMPT: &str = "Analyze the following text extracted from a document. Based on the content, \
create a concise and descriptive topic title (4-8 words) that summarizes what this section is about. \
This title will be used to group related content. Do not add any prefixes like 'Topic:'.";

#[derive(Debug, Clone, Copy)]
pub struct LabelerConfig {
    pub chunks_per_topic: usize,
    pub max_batch_chars: usize,
    pub temperature: f32,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self { chunks_per_topic: 20, max_batch_chars: 8000, temperature: 0.3 }
    }
}

impl LabelerConfig {
    pub fn from_settings(chunking: &ChunkingSettings, model: &ModelSettings) -> Self {
        Self {
            chunks_per_topic: chunking.chunks_per_topic,
            max_batch_chars: chunking.max_label_chars,
            temperature: model.temperature,
        }
    }
}

pub struct TopicLabeler {
    model: Arc<dyn TextGenerator>,
    config: LabelerConfig,
}

impl TopicLabeler {
    pub fn new(model: Arc<dyn TextGenerator>, config: LabelerConfig) -> Self {
        Self { model, config: LabelerConfig { chunks_per_topic: config.chunks_per_topic.max(1), ..config } }
    }

    /// Number of label calls `label` will make for `chunk_count` chunks.
    pub fn batch_count(&self, chunk_count: usize) -> usize {
        chunk_count.div_ceil(self.config.chunks_per_topic)
    }

    /// Label every chunk. Batches are processed one at a time, in order.
    pub async fn label(&self, chunks: Vec<Chunk>) -> LabeledChunks {
        self.label_with_progress(chunks, |_| {}).await
    }

    /// Like [`label`](Self::label), calling `on_batch` after each batch.
    pub async fn label_with_progress<F>(&self, chunks: Vec<Chunk>, mut on_batch: F) -> LabeledChunks
    where
        F: FnMut(&BatchOutcome) + Send,
    {
        let mut labels = Vec::with_capacity(chunks.len());
        let mut batches = Vec::new();

        for (n, batch) in chunks.chunks(self.config.chunks_per_topic).enumerate() {
            let start = n * self.config.chunks_per_topic;
            let range = start..start + batch.len();
            let outcome = match self.label_batch(batch).await {
                Ok(label) => {
                    tracing::info!(label = %label, first = range.start, last = range.end - 1, "labeled topic batch");
                    BatchOutcome::Labeled { range, label }
                }
                Err(reason) => {
                    tracing::warn!(first = range.start, last = range.end - 1, %reason, "topic labeling failed, using fallback");
                    BatchOutcome::Fallback { range, label: FALLBACK_TOPIC.to_string(), reason }
                }
            };
            labels.extend(std::iter::repeat(outcome.label().to_string()).take(batch.len()));
            on_batch(&outcome);
            batches.push(outcome);
        }

        LabeledChunks { chunks, labels, batches }
    }

    async fn label_batch(&self, batch: &[Chunk]) -> Result<String, String> {
        let joined = batch.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let text = truncate_chars(&joined, self.config.max_batch_chars);
        let prompt = format!("{LABEL_PROMPT}\n\n---\n{text}\n---");
        let raw = self
            .model
            .generate(&prompt, self.config.temperature)
            .await
            .map_err(|e| e.to_string())?;
        clean_label(&raw).ok_or_else(|| "model returned an empty title".to_string())
    }
}

/// Strip whitespace, wrapping quotes and a leading `Topic:` prefix.
pub fn clean_label(raw: &str) -> Option<String> {
    let undecorate = |s: &str| s.trim().trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`')).trim().to_string();
    let mut label = undecorate(raw.trim().lines().next().unwrap_or_default());
    if label.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("topic:")) {
        label = undecorate(&label[6..]);
    }
    if label.is_empty() { None } else { Some(label) }
}

/// Longest prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
