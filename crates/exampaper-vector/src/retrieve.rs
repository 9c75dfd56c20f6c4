//! Topic-balanced retrieval.
//!
//! Instead of one top-K query over the whole index, the total budget is split
//! evenly across distinct topic labels and each topic is queried on its own
//! with an exact label filter. Topics that return fewer hits than their quota
//! do not hand the remainder to other topics.
use anyhow::Result;

use exampaper_core::config::RetrievalSettings;
use exampaper_core::topics::truncate_chars;
use exampaper_core::traits::TopicSearch;
use exampaper_core::types::RetrievalSet;

const SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct BalancedRetriever {
    total_chunks: usize,
    max_chars: usize,
    query: String,
}

impl Default for BalancedRetriever {
    fn default() -> Self { Self::from(&RetrievalSettings::default()) }
}

impl From<&RetrievalSettings> for BalancedRetriever {
    fn from(s: &RetrievalSettings) -> Self {
        Self { total_chunks: s.total_chunks, max_chars: s.max_chars, query: s.query.clone() }
    }
}

/// Per-topic quota: `max(1, total / topics)`, or 0 when there are no topics.
pub fn k_per_topic(total_chunks: usize, topic_count: usize) -> usize {
    if topic_count == 0 { 0 } else { (total_chunks / topic_count).max(1) }
}

impl BalancedRetriever {
    pub fn new(total_chunks: usize, max_chars: usize, query: impl Into<String>) -> Self {
        Self { total_chunks, max_chars, query: query.into() }
    }

    pub async fn retrieve(&self, index: &dyn TopicSearch, topics: &[String]) -> Result<RetrievalSet> {
        let mut unique: Vec<&String> = topics.iter().collect();
        unique.sort();
        unique.dedup();

        let k = k_per_topic(self.total_chunks, unique.len());
        tracing::info!(k_per_topic = k, topics = unique.len(), "retrieving balanced content");

        let mut set = RetrievalSet { k_per_topic: k, ..RetrievalSet::default() };
        if k == 0 { return Ok(set); }
        for topic in unique {
            let hits = index.search_topic(&self.query, topic, k).await?;
            set.per_topic.push((topic.clone(), hits.len()));
            set.texts.extend(hits.into_iter().take(k));
        }

        let joined = set.texts.join(SEPARATOR);
        let content = truncate_chars(&joined, self.max_chars);
        set.truncated = content.len() < joined.len();
        set.content = content.to_string();
        tracing::info!(records = set.texts.len(), chars = set.content.chars().count(), truncated = set.truncated, "retrieval complete");
        Ok(set)
    }
}
