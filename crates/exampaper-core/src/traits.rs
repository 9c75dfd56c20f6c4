use async_trait::async_trait;

use crate::error::LlmError;

/// Text embedding capability. Implementations return L2-normalized vectors of
/// `dim()` length and must be stable for a given `id()`.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model, persisted alongside an index.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> crate::Result<String>;
}

/// Single-prompt text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, LlmError>;
}

/// Similarity search restricted to one topic label.
#[async_trait]
pub trait TopicSearch: Send + Sync {
    async fn search_topic(&self, query: &str, topic: &str, k: usize) -> anyhow::Result<Vec<String>>;
}
