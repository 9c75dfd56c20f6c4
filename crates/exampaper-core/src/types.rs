//! Domain types shared by the chunking, indexing and generation stages.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Label assigned to a batch whose labeling call failed.
pub const FALLBACK_TOPIC: &str = "General Topic";

/// A bounded, contiguous piece of the extracted document text.
///
/// - `index`: position in the splitter's output sequence
/// - `start`/`end`: byte span of the (untrimmed) window in the source text
/// - `text`: the whitespace-trimmed window content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Result of labeling one contiguous batch of chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Labeled { range: Range<usize>, label: String },
    Fallback { range: Range<usize>, label: String, reason: String },
}

impl BatchOutcome {
    pub fn range(&self) -> &Range<usize> {
        match self {
            BatchOutcome::Labeled { range, .. } | BatchOutcome::Fallback { range, .. } => range,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            BatchOutcome::Labeled { label, .. } | BatchOutcome::Fallback { label, .. } => label,
        }
    }

    pub fn is_fallback(&self) -> bool { matches!(self, BatchOutcome::Fallback { .. }) }
}

/// Chunks paired with their topic labels. `labels[i]` belongs to `chunks[i]`.
#[derive(Debug, Clone, Default)]
pub struct LabeledChunks {
    pub chunks: Vec<Chunk>,
    pub labels: Vec<String>,
    pub batches: Vec<BatchOutcome>,
}

impl LabeledChunks {
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn fallback_count(&self) -> usize { self.batches.iter().filter(|b| b.is_fallback()).count() }

    /// Distinct labels in lexicographic order.
    pub fn unique_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.labels.clone();
        topics.sort();
        topics.dedup();
        topics
    }
}

/// User parameters for a question paper.
///
/// Field names follow the form fields accepted by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRequest {
    #[serde(rename = "Standard")]
    pub standard: String,
    #[serde(rename = "Subject_Name")]
    pub subject_name: String,
    pub difficulty: String,
    #[serde(rename = "countOfMCQs")]
    pub count_of_mcqs: u32,
    #[serde(rename = "countOfShort")]
    pub count_of_short: u32,
    #[serde(rename = "countOfLong")]
    pub count_of_long: u32,
    #[serde(rename = "User_defined_notes", default)]
    pub user_defined_notes: Option<String>,
}

impl PaperRequest {
    pub fn validate(&self) -> crate::Result<()> {
        if self.count_of_mcqs == 0 {
            return Err(crate::Error::InvalidRequest("countOfMCQs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Notes as substituted into the prompt; absent or blank becomes `"None"`.
    pub fn notes_or_none(&self) -> &str {
        match self.user_defined_notes.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => "None",
        }
    }
}

/// Content sampled evenly across topics, ready for prompt substitution.
#[derive(Debug, Clone, Default)]
pub struct RetrievalSet {
    pub k_per_topic: usize,
    pub per_topic: Vec<(String, usize)>,
    pub texts: Vec<String>,
    pub content: String,
    pub truncated: bool,
}

impl RetrievalSet {
    pub fn is_empty(&self) -> bool { self.texts.is_empty() }
}
