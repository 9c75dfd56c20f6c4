//! exampaper-pipeline
//!
//! Wires extraction, chunking, topic labeling, indexing, balanced retrieval
//! and generation into the two request operations: `question_paper` and
//! `answer_key`. Every stage of one request runs sequentially.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use exampaper_core::chunker::{Chunker, ChunkingConfig};
use exampaper_core::config::{resolve_with_base, IndexNamespace, Settings};
use exampaper_core::extract::PdfExtractor;
use exampaper_core::topics::{LabelerConfig, TopicLabeler};
use exampaper_core::traits::{Embedder, TextExtractor};
use exampaper_core::types::{BatchOutcome, Chunk, LabeledChunks, PaperRequest, RetrievalSet};
use exampaper_core::{Error, Result};
use exampaper_embed::embedder_from_settings;
use exampaper_llm::{ChatClient, PaperGenerator};
use exampaper_vector::{BalancedRetriever, IndexSummary, IndexWriter, TopicIndex};

/// The capabilities a pipeline is assembled from.
pub struct Components {
    pub extractor: Arc<dyn TextExtractor>,
    pub chunker: Chunker,
    pub labeler: TopicLabeler,
    pub embedder: Arc<dyn Embedder>,
    pub retriever: BalancedRetriever,
    pub generator: PaperGenerator,
}

/// Where indexes live and how requests share them.
#[derive(Debug, Clone)]
pub struct IndexLocation {
    pub dir: PathBuf,
    pub table: String,
    pub namespace: IndexNamespace,
}

/// Outcome of an offline ingest run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub chunks: usize,
    /// Label and chunk count, sorted by label.
    pub topics: Vec<(String, usize)>,
    pub fallbacks: usize,
    pub index: IndexSummary,
}

pub struct ExamPipeline {
    extractor: Arc<dyn TextExtractor>,
    chunker: Chunker,
    labeler: TopicLabeler,
    embedder: Arc<dyn Embedder>,
    retriever: BalancedRetriever,
    generator: PaperGenerator,
    index: IndexLocation,
    // serializes build+retrieve on the shared directory
    shared: Mutex<()>,
}

impl ExamPipeline {
    pub fn new(components: Components, index: IndexLocation) -> Self {
        let Components { extractor, chunker, labeler, embedder, retriever, generator } = components;
        Self { extractor, chunker, labeler, embedder, retriever, generator, index, shared: Mutex::new(()) }
    }

    /// Assemble the production pipeline. Relative paths resolve against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        let labeler_model = Arc::new(ChatClient::new(&settings.llm.labeler)?);
        let generator_model = Arc::new(ChatClient::new(&settings.llm.generator)?);
        let embedder = embedder_from_settings(&settings.embedding).map_err(|e| Error::Embedding(format!("{e:#}")))?;
        tracing::info!(
            embedder = embedder.id(),
            labeler = labeler_model.model(),
            generator = generator_model.model(),
            "pipeline components ready"
        );

        let components = Components {
            extractor: Arc::new(PdfExtractor::new()),
            chunker: Chunker::new(ChunkingConfig::from(&settings.chunking))?,
            labeler: TopicLabeler::new(labeler_model, LabelerConfig::from_settings(&settings.chunking, &settings.llm.labeler)),
            embedder: Arc::from(embedder),
            retriever: BalancedRetriever::from(&settings.retrieval),
            generator: PaperGenerator::from_settings(generator_model, &settings.prompts, base)?
                .with_temperature(settings.llm.generator.temperature),
        };
        let index = IndexLocation {
            dir: resolve_with_base(base, &settings.index.dir),
            table: settings.index.table.clone(),
            namespace: settings.index.namespace,
        };
        Ok(Self::new(components, index))
    }

    pub fn index_location(&self) -> &IndexLocation { &self.index }

    /// Label calls needed for `chunk_count` chunks.
    pub fn label_batches(&self, chunk_count: usize) -> usize { self.labeler.batch_count(chunk_count) }

    /// Generate a question paper. Without a document the prompt's content is empty.
    pub async fn question_paper(&self, request: &PaperRequest, document: Option<&[u8]>) -> Result<String> {
        request.validate()?;
        let content = match document {
            Some(bytes) => self.document_content(bytes).await?.content,
            None => {
                tracing::info!("no document uploaded, generating without source content");
                String::new()
            }
        };
        self.generator.question_paper(request, &content).await
    }

    /// Generate an answer key from a previously generated paper. No retrieval is involved.
    pub async fn answer_key(&self, question_paper: &str) -> Result<String> {
        if question_paper.trim().is_empty() {
            return Err(Error::InvalidRequest("question_paper must not be empty".into()));
        }
        self.generator.answer_key(question_paper).await
    }

    /// Extract, chunk, label, index and sample a document.
    pub async fn document_content(&self, bytes: &[u8]) -> Result<RetrievalSet> {
        let chunks = self.chunk_document(bytes).await?;
        let labeled = self.labeler.label(chunks).await;
        tracing::info!(chunks = labeled.len(), topics = labeled.unique_topics().len(), fallbacks = labeled.fallback_count(), "document labeled");

        let set = match self.index.namespace {
            IndexNamespace::Shared => {
                let _guard = self.shared.lock().await;
                self.build_and_retrieve(&self.index.dir, &labeled).await?
            }
            IndexNamespace::PerRequest => {
                let dir = self.index.dir.join(Uuid::new_v4().to_string());
                let result = self.build_and_retrieve(&dir, &labeled).await;
                remove_scratch_index(&dir);
                result?
            }
        };
        if set.is_empty() {
            return Err(Error::NoContent);
        }
        Ok(set)
    }

    /// Extract and split a document; a document with no text is `NoContent`.
    pub async fn chunk_document(&self, bytes: &[u8]) -> Result<Vec<Chunk>> {
        let text = self.extract(bytes).await?;
        let chunks = self.chunker.split(&text);
        tracing::info!(chars = text.chars().count(), chunks = chunks.len(), "document chunked");
        if chunks.is_empty() {
            return Err(Error::NoContent);
        }
        Ok(chunks)
    }

    /// Label `chunks` and rebuild the configured index directory with them.
    pub async fn ingest<F>(&self, chunks: Vec<Chunk>, on_batch: F) -> Result<IngestReport>
    where
        F: FnMut(&BatchOutcome) + Send,
    {
        let labeled = self.labeler.label_with_progress(chunks, on_batch).await;
        let _guard = self.shared.lock().await;
        let index = IndexWriter::new(&self.index.dir, &self.index.table).build(&labeled, self.embedder.clone()).await?;
        Ok(IngestReport { chunks: labeled.len(), topics: topic_counts(&labeled), fallbacks: labeled.fallback_count(), index })
    }

    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        let extractor = self.extractor.clone();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| Error::Extraction(format!("extraction task failed: {e}")))?
    }

    async fn build_and_retrieve(&self, dir: &Path, labeled: &LabeledChunks) -> Result<RetrievalSet> {
        IndexWriter::new(dir, &self.index.table).build(labeled, self.embedder.clone()).await?;
        let index = TopicIndex::open(dir, &self.index.table, self.embedder.clone()).await.map_err(|e| Error::index(&e))?;
        self.retriever.retrieve(&index, &labeled.unique_topics()).await.map_err(|e| Error::index(&e))
    }
}

fn topic_counts(labeled: &LabeledChunks) -> Vec<(String, usize)> {
    let mut counts = std::collections::BTreeMap::<&str, usize>::new();
    for label in &labeled.labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    counts.into_iter().map(|(l, n)| (l.to_string(), n)).collect()
}

fn remove_scratch_index(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove per-request index");
        }
    }
}
