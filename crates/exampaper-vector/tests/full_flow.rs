use std::sync::Arc;

use exampaper_core::traits::Embedder;
use exampaper_core::types::{Chunk, LabeledChunks};
use exampaper_embed::HashEmbedder;
use exampaper_vector::{BalancedRetriever, IndexWriter, TopicIndex};
use tempfile::TempDir;

const TABLE: &str = "chunks";

fn labeled_corpus() -> LabeledChunks {
    let texts = [
        ("Optics", "light travels in straight lines and reflects off mirrors"),
        ("Optics", "a convex lens converges parallel rays to a focal point"),
        ("Optics", "refraction bends light when it enters glass or water"),
        ("Acids and Bases", "acids turn blue litmus red and have a sour taste"),
        ("Acids and Bases", "bases feel soapy and turn red litmus blue"),
        ("Cell Biology", "the nucleus controls the activities of the cell"),
        ("Cell Biology", "mitochondria release energy through cellular respiration"),
    ];
    let chunks = texts
        .iter()
        .enumerate()
        .map(|(i, (_, t))| Chunk { index: i, start: 0, end: t.len(), text: t.to_string() })
        .collect();
    LabeledChunks { chunks, labels: texts.iter().map(|(l, _)| l.to_string()).collect(), batches: Vec::new() }
}

fn embedder() -> Arc<dyn Embedder> { Arc::new(HashEmbedder::new(128)) }

#[tokio::test]
async fn persisted_index_returns_exact_chunk_first() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    let labeled = labeled_corpus();

    let summary = IndexWriter::new(&dir, TABLE).build(&labeled, embedder()).await.expect("build");
    assert_eq!(summary.records, labeled.len());
    assert!(dir.exists());

    let index = TopicIndex::open(&dir, TABLE, embedder()).await.expect("reopen");
    assert_eq!(index.count().await.expect("count"), labeled.len());
    for chunk in &labeled.chunks {
        let hits = index.nearest(&chunk.text, None, 3).await.expect("search");
        assert_eq!(hits[0].content, chunk.text, "exact text should be its own nearest neighbour");
        assert_eq!(hits[0].chunk_index, chunk.index);
    }
}

#[tokio::test]
async fn topic_filter_is_exact_match() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    IndexWriter::new(&dir, TABLE).build(&labeled_corpus(), embedder()).await.expect("build");
    let index = TopicIndex::open(&dir, TABLE, embedder()).await.expect("reopen");

    assert_eq!(index.topics().await.expect("topics"), vec!["Acids and Bases", "Cell Biology", "Optics"]);
    let hits = index.nearest("light and lenses", Some("Optics"), 10).await.expect("search");
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.topic_label == "Optics"));
    assert!(index.nearest("anything", Some("Optic"), 10).await.expect("search").is_empty());
}

#[tokio::test]
async fn balanced_retrieval_over_lance_covers_every_topic() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    let labeled = labeled_corpus();
    IndexWriter::new(&dir, TABLE).build(&labeled, embedder()).await.expect("build");
    let index = TopicIndex::open(&dir, TABLE, embedder()).await.expect("reopen");

    let set = BalancedRetriever::new(3, 12000, "Generate questions about this content")
        .retrieve(&index, &labeled.unique_topics())
        .await
        .expect("retrieve");
    assert_eq!(set.k_per_topic, 1);
    assert_eq!(set.texts.len(), 3);
    let topics: Vec<&str> = set.per_topic.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(topics, vec!["Acids and Bases", "Cell Biology", "Optics"]);
}

#[tokio::test]
async fn rebuild_replaces_previous_index() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    let writer = IndexWriter::new(&dir, TABLE);
    writer.build(&labeled_corpus(), embedder()).await.expect("first build");

    let mut smaller = labeled_corpus();
    smaller.chunks.truncate(2);
    smaller.labels.truncate(2);
    writer.build(&smaller, embedder()).await.expect("second build");

    let index = TopicIndex::open(&dir, TABLE, embedder()).await.expect("reopen");
    assert_eq!(index.count().await.expect("count"), 2);
    assert_eq!(index.topics().await.expect("topics"), vec!["Optics"]);
}

#[tokio::test]
async fn rebuild_keeps_unrelated_files_and_nested_indexes() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    let writer = IndexWriter::new(&dir, TABLE);
    writer.build(&labeled_corpus(), embedder()).await.expect("first build");

    std::fs::write(dir.join("notes.txt"), "keep me").expect("write notes");
    let nested = dir.join("2b7c0a4e");
    IndexWriter::new(&nested, TABLE).build(&labeled_corpus(), embedder()).await.expect("nested build");

    let mut smaller = labeled_corpus();
    smaller.chunks.truncate(3);
    smaller.labels.truncate(3);
    writer.build(&smaller, embedder()).await.expect("rebuild");

    assert_eq!(std::fs::read_to_string(dir.join("notes.txt")).expect("notes survive"), "keep me");
    let nested_index = TopicIndex::open(&nested, TABLE, embedder()).await.expect("nested reopen");
    assert_eq!(nested_index.count().await.expect("count"), labeled_corpus().len());
    let index = TopicIndex::open(&dir, TABLE, embedder()).await.expect("reopen");
    assert_eq!(index.count().await.expect("count"), 3);
}

#[tokio::test]
async fn rebuild_with_a_new_embedder_replaces_schema_and_metadata() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    let writer = IndexWriter::new(&dir, TABLE);
    writer.build(&labeled_corpus(), embedder()).await.expect("first build");

    let smaller: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(32));
    let summary = writer.build(&labeled_corpus(), smaller.clone()).await.expect("rebuild");
    assert_eq!(summary.dim, 32);

    let index = TopicIndex::open(&dir, TABLE, smaller).await.expect("reopen with new embedder");
    assert_eq!(index.count().await.expect("count"), labeled_corpus().len());
    assert!(TopicIndex::open(&dir, TABLE, embedder()).await.is_err());
}

#[tokio::test]
async fn reopening_with_a_different_embedder_fails() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    IndexWriter::new(&dir, TABLE).build(&labeled_corpus(), embedder()).await.expect("build");

    let other: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let err = TopicIndex::open(&dir, TABLE, other).await.err().expect("mismatch must fail");
    assert!(err.to_string().contains("hash:xxh64:d128"));
}

#[tokio::test]
async fn mismatched_labels_are_rejected_before_writing() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("vector_store");
    let mut labeled = labeled_corpus();
    labeled.labels.pop();
    let err = IndexWriter::new(&dir, TABLE).build(&labeled, embedder()).await.unwrap_err();
    assert!(matches!(err, exampaper_core::Error::Index(_)));
    assert!(!dir.exists());
}
