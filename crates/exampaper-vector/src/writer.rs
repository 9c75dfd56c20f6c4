use anyhow::{Context, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::database::CreateTableMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exampaper_core::traits::Embedder;
use exampaper_core::types::LabeledChunks;
use exampaper_core::Error;

use crate::schema::{build_chunks_schema, META_TABLE};
use crate::table::{open_db, write_meta};
use crate::embed_blocking;

const INSERT_BATCH: usize = 1000;

#[derive(Debug, Clone)]
pub struct IndexRecord {
	pub id: String,
	pub chunk_index: usize,
	pub topic_label: String,
	pub content: String,
	pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct IndexSummary {
	pub dir: PathBuf,
	pub records: usize,
	pub dim: usize,
	pub embedder_id: String,
}

/// Writes a complete topic index into a directory, replacing whatever was there.
pub struct IndexWriter { dir: PathBuf, table_name: String }

impl IndexWriter {
	pub fn new(dir: &Path, table_name: &str) -> Self {
		Self { dir: dir.to_path_buf(), table_name: table_name.to_string() }
	}

	/// Embed every chunk and persist it with its topic label.
	///
	/// Embedding failures surface as `Error::Embedding`; storage failures as
	/// `Error::Index`. A failed write may leave the previous chunks table
	/// replaced while the metadata still describes the old build.
	pub async fn build(&self, labeled: &LabeledChunks, embedder: Arc<dyn Embedder>) -> exampaper_core::Result<IndexSummary> {
		if labeled.chunks.len() != labeled.labels.len() {
			return Err(Error::Index(format!("{} chunks but {} labels", labeled.chunks.len(), labeled.labels.len())));
		}
		let texts: Vec<String> = labeled.chunks.iter().map(|c| c.text.clone()).collect();
		let embeddings = embed_blocking(embedder.clone(), texts).await.map_err(|e| Error::Embedding(format!("{e:#}")))?;
		if embeddings.len() != labeled.len() {
			return Err(Error::Embedding(format!("embedder returned {} vectors for {} chunks", embeddings.len(), labeled.len())));
		}
		if let Some(bad) = embeddings.iter().find(|v| v.len() != embedder.dim()) {
			return Err(Error::Embedding(format!("dim mismatch: got {} expected {}", bad.len(), embedder.dim())));
		}
		let records = to_records(labeled, embeddings);
		self.write(&records, embedder.id(), embedder.dim()).await.map_err(|e| Error::index(&e))
	}

	/// Replace the chunks table with `records`. Other files in the directory,
	/// including other indexes nested below it, are left untouched.
	pub async fn write(&self, records: &[IndexRecord], embedder_id: &str, dim: usize) -> Result<IndexSummary> {
		anyhow::ensure!(!records.is_empty(), "refusing to build an empty index");
		std::fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;

		let conn = open_db(&self.dir.to_string_lossy()).await?;
		let mut batches = records.chunks(INSERT_BATCH);
		let first = batches.next().context("no records to write")?;
		let table = conn
			.create_table(&self.table_name, batch_reader(first, dim)?)
			.mode(CreateTableMode::Overwrite)
			.execute()
			.await
			.context("creating chunks table")?;
		for batch in batches {
			table.add(batch_reader(batch, dim)?).execute().await.context("appending chunks")?;
		}
		write_meta(&conn, META_TABLE, &[
			("embedder_id", embedder_id.to_string()),
			("dimension", dim.to_string()),
			("record_count", records.len().to_string()),
			("built_at", chrono::Utc::now().to_rfc3339()),
		]).await?;

		tracing::info!(records = records.len(), dir = %self.dir.display(), table = %self.table_name, "index built");
		Ok(IndexSummary { dir: self.dir.clone(), records: records.len(), dim, embedder_id: embedder_id.to_string() })
	}
}

pub fn to_records(labeled: &LabeledChunks, embeddings: Vec<Vec<f32>>) -> Vec<IndexRecord> {
	labeled
		.chunks
		.iter()
		.zip(labeled.labels.iter())
		.zip(embeddings)
		.map(|((chunk, label), vector)| IndexRecord {
			id: record_id(chunk.index, &chunk.text),
			chunk_index: chunk.index,
			topic_label: label.clone(),
			content: chunk.text.clone(),
			vector,
		})
		.collect()
}

/// Ordinal plus a content-hash prefix; unique within one index.
pub fn record_id(index: usize, content: &str) -> String {
	let hash = blake3::hash(content.as_bytes()).to_hex();
	format!("{index:05}-{}", &hash.as_str()[..16])
}

fn batch_reader(records: &[IndexRecord], dim: usize) -> Result<Box<RecordBatchIterator<std::vec::IntoIter<std::result::Result<RecordBatch, arrow_schema::ArrowError>>>>> {
	let rb = records_to_batch(records, dim)?;
	let schema = rb.schema();
	Ok(Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema)))
}

fn records_to_batch(records: &[IndexRecord], dim: usize) -> Result<RecordBatch> {
	let dim = i32::try_from(dim).context("embedding dimension exceeds i32")?;
	let schema = build_chunks_schema(dim);
	let mut ids = Vec::new(); let mut chunk_indices = Vec::new(); let mut labels = Vec::new(); let mut contents = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
	for r in records {
		ids.push(r.id.clone());
		chunk_indices.push(i32::try_from(r.chunk_index).context("chunk index exceeds i32")?);
		labels.push(r.topic_label.clone());
		contents.push(r.content.clone());
		vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(Int32Array::from(chunk_indices)),
		Arc::new(StringArray::from(labels)),
		Arc::new(StringArray::from(contents)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
	])?;
	Ok(record_batch)
}
