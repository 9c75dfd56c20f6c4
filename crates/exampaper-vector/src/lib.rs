//! exampaper-vector
//!
//! LanceDB-backed topic index: building (`writer`), reopening and filtered
//! similarity search (`search`), and topic-balanced retrieval (`retrieve`).
use anyhow::{anyhow, Result};
use std::sync::Arc;

use exampaper_core::traits::Embedder;

pub mod retrieve;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use retrieve::{k_per_topic, BalancedRetriever};
pub use search::{SearchResult, TopicIndex};
pub use writer::{IndexRecord, IndexSummary, IndexWriter};

/// Run an embedding call on the blocking pool; model inference is CPU-bound.
pub async fn embed_blocking(embedder: Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .map_err(|e| anyhow!("embedding task panicked: {e}"))?
}
