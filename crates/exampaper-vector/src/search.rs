use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use exampaper_core::traits::{Embedder, TopicSearch};

use crate::embed_blocking;
use crate::schema::META_TABLE;
use crate::table::{escape_literal, open_db, read_meta};

/// A persisted topic index reopened for querying.
pub struct TopicIndex { table: Table, embedder: Arc<dyn Embedder> }

#[derive(Debug, Clone)]
pub struct SearchResult { pub chunk_index: usize, pub topic_label: String, pub content: String, pub distance: f32 }

impl TopicIndex {
	/// Reopen the index at `dir`. The embedder must be the one that built it.
	pub async fn open(dir: &Path, table_name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
		if !dir.exists() { bail!("index directory {} does not exist", dir.display()); }
		let conn = open_db(&dir.to_string_lossy()).await?;
		match read_meta(&conn, META_TABLE).await?.remove("embedder_id") {
			Some(stored) if stored != embedder.id() => bail!("index at {} was built with '{}' but the current embedder is '{}'", dir.display(), stored, embedder.id()),
			Some(_) => {}
			None => tracing::warn!(dir = %dir.display(), "index has no embedder metadata; assuming it matches"),
		}
		let table = conn.open_table(table_name).execute().await.with_context(|| format!("opening table '{table_name}'"))?;
		Ok(Self { table, embedder })
	}

	pub async fn count(&self) -> Result<usize> {
		Ok(self.table.count_rows(None).await?)
	}

	/// Distinct topic labels present in the index, sorted.
	pub async fn topics(&self) -> Result<Vec<String>> {
		let mut topics = BTreeSet::new();
		let mut stream = self.table.query().select(Select::columns(&["topic_label"])).execute().await?;
		while let Some(batch) = stream.try_next().await? {
			let col = string_col(&batch, "topic_label")?;
			for i in 0..batch.num_rows() { topics.insert(col.value(i).to_string()); }
		}
		Ok(topics.into_iter().collect())
	}

	/// Up to `k` records nearest to `query` by cosine distance, optionally
	/// restricted to an exact topic label.
	pub async fn nearest(&self, query: &str, topic: Option<&str>, k: usize) -> Result<Vec<SearchResult>> {
		if k == 0 { return Ok(Vec::new()); }
		let query_vec = embed_blocking(self.embedder.clone(), vec![query.to_string()])
			.await?
			.pop()
			.ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
		let mut q = self.table.query().nearest_to(query_vec)?.distance_type(DistanceType::Cosine).limit(k);
		if let Some(topic) = topic {
			q = q.only_if(format!("topic_label = '{}'", escape_literal(topic)));
		}
		let mut stream = q.execute().await?;
		let mut results = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let content = string_col(&batch, "content")?;
			let labels = string_col(&batch, "topic_label")?;
			let indices = batch.column_by_name("chunk_index").and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("chunk_index column missing"))?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
			for i in 0..batch.num_rows() {
				let distance = distances.filter(|d| d.is_valid(i)).map_or(f32::MAX, |d| d.value(i));
				results.push(SearchResult {
					chunk_index: usize::try_from(indices.value(i)).unwrap_or_default(),
					topic_label: labels.value(i).to_string(),
					content: content.value(i).to_string(),
					distance,
				});
			}
		}
		results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
		results.truncate(k);
		Ok(results)
	}
}

#[async_trait]
impl TopicSearch for TopicIndex {
	async fn search_topic(&self, query: &str, topic: &str, k: usize) -> Result<Vec<String>> {
		Ok(self.nearest(query, Some(topic), k).await?.into_iter().map(|r| r.content).collect())
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("{name} column missing"))
}
