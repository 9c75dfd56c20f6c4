use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use figment::providers::{Format, Toml};
use figment::Figment;

use exampaper_core::chunker::{Chunker, ChunkingConfig};
use exampaper_core::config::{Config, EmbeddingProvider, IndexNamespace};
use exampaper_core::topics::{LabelerConfig, TopicLabeler};
use exampaper_core::traits::TextGenerator;
use exampaper_core::types::{BatchOutcome, Chunk, FALLBACK_TOPIC};
use exampaper_core::{Error, LlmError};

/// Answers "Topic N" for call N, failing on the calls listed in `fail_on`.
struct ScriptedLabeler {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
}

impl ScriptedLabeler {
    fn new(fail_on: Vec<usize>) -> Self { Self { calls: AtomicUsize::new(0), fail_on } }
}

#[async_trait]
impl TextGenerator for ScriptedLabeler {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, LlmError> {
        assert!(prompt.contains("4-8 words"));
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&n) {
            return Err(LlmError::RateLimited { provider: "scripted".into() });
        }
        Ok(format!("Topic {n}\n"))
    }
}

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n).map(|i| Chunk { index: i, start: i * 10, end: i * 10 + 9, text: format!("chunk number {i}") }).collect()
}

#[tokio::test]
async fn forty_seven_chunks_make_three_batches() {
    let labeler = TopicLabeler::new(Arc::new(ScriptedLabeler::new(vec![])), LabelerConfig::default());
    let labeled = labeler.label(chunks(47)).await;

    assert_eq!(labeled.len(), 47);
    assert_eq!(labeled.labels.len(), 47);
    let ranges: Vec<_> = labeled.batches.iter().map(|b| b.range().clone()).collect();
    assert_eq!(ranges, vec![0..20, 20..40, 40..47]);
    assert!(labeled.labels[0..20].iter().all(|l| l == "Topic 0"));
    assert!(labeled.labels[20..40].iter().all(|l| l == "Topic 1"));
    assert!(labeled.labels[40..47].iter().all(|l| l == "Topic 2"));
    assert_eq!(labeled.unique_topics(), vec!["Topic 0", "Topic 1", "Topic 2"]);
    assert_eq!(labeled.fallback_count(), 0);
}

#[tokio::test]
async fn failing_batch_gets_fallback_and_processing_continues() {
    let model = Arc::new(ScriptedLabeler::new(vec![1]));
    let config = LabelerConfig { chunks_per_topic: 5, ..LabelerConfig::default() };
    let labeled = TopicLabeler::new(model.clone(), config).label(chunks(12)).await;

    assert_eq!(model.calls.load(Ordering::SeqCst), 3, "every batch is attempted");
    assert!(labeled.labels[5..10].iter().all(|l| l == FALLBACK_TOPIC));
    assert!(labeled.labels[0..5].iter().all(|l| l == "Topic 0"));
    assert!(labeled.labels[10..12].iter().all(|l| l == "Topic 2"));
    assert_eq!(labeled.fallback_count(), 1);
    match &labeled.batches[1] {
        BatchOutcome::Fallback { reason, range, .. } => {
            assert_eq!(*range, 5..10);
            assert!(reason.contains("rate limit"), "reason was {reason}");
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_chunk_list_labels_nothing() {
    let model = Arc::new(ScriptedLabeler::new(vec![]));
    let labeled = TopicLabeler::new(model.clone(), LabelerConfig::default()).label(Vec::new()).await;
    assert!(labeled.is_empty());
    assert!(labeled.unique_topics().is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_callback_sees_each_batch_in_order() {
    let labeler = TopicLabeler::new(Arc::new(ScriptedLabeler::new(vec![0])), LabelerConfig::default());
    assert_eq!(labeler.batch_count(47), 3);
    assert_eq!(labeler.batch_count(0), 0);

    let mut seen = Vec::new();
    labeler.label_with_progress(chunks(47), |b| seen.push((b.range().start, b.is_fallback()))).await;
    assert_eq!(seen, vec![(0, true), (20, false), (40, false)]);
}

#[test]
fn chunks_cover_the_text_without_gaps() {
    let paragraph = "The mitochondria is the powerhouse of the cell. It produces ATP through respiration.";
    let text = (0..60).map(|i| format!("{i}. {paragraph}")).collect::<Vec<_>>().join("\n");
    let chunker = Chunker::new(ChunkingConfig { chunk_size: 400, chunk_overlap: 60 }).unwrap();
    let chunks = chunker.split(&text);

    assert!(chunks.len() > 5);
    assert_eq!(text[..chunks[0].start].trim(), "");
    assert_eq!(text[chunks[chunks.len() - 1].end..].trim(), "");
    for pair in chunks.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert_eq!(b.index, a.index + 1);
        assert!(b.start <= a.end, "gap between chunk {} and {}", a.index, b.index);
        assert!(text[a.start..a.end].contains(a.text.as_str()));
    }
}

#[test]
fn settings_default_to_documented_constants() {
    let settings = Config::from_figment(Figment::new()).settings().expect("settings");
    assert_eq!(settings.chunking.chunk_size, 2000);
    assert_eq!(settings.chunking.chunk_overlap, 300);
    assert_eq!(settings.chunking.chunks_per_topic, 20);
    assert_eq!(settings.chunking.max_label_chars, 8000);
    assert_eq!(settings.retrieval.total_chunks, 15);
    assert_eq!(settings.retrieval.max_chars, 12000);
    assert_eq!(settings.index.dir, "vector_store");
    assert_eq!(settings.index.namespace, IndexNamespace::Shared);
    assert!((settings.llm.generator.temperature - 0.2).abs() < f32::EPSILON);
    assert!((settings.llm.labeler.temperature - 0.3).abs() < f32::EPSILON);
}

#[test]
fn toml_overrides_are_merged() {
    let toml = r#"
        [chunking]
        chunk_size = 500
        chunk_overlap = 50

        [index]
        namespace = "per_request"

        [embedding]
        provider = "hash"
        dim = 64

        [llm.generator]
        api_key = "sk-test"
    "#;
    let config = Config::from_figment(Figment::new().merge(Toml::string(toml)));
    let settings = config.settings().expect("settings");
    assert_eq!(settings.chunking.chunk_size, 500);
    assert_eq!(settings.chunking.chunks_per_topic, 20, "untouched keys keep defaults");
    assert_eq!(settings.index.namespace, IndexNamespace::PerRequest);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
    assert!(settings.llm.generator.api_key.is_some());
    assert!(!format!("{:?}", settings.llm.generator).contains("sk-test"), "api key must not leak via Debug");

    let dim: usize = config.get("embedding.dim").expect("get");
    assert_eq!(dim, 64);
}

#[test]
fn overlap_not_smaller_than_size_is_rejected() {
    let toml = "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n";
    let err = Config::from_figment(Figment::new().merge(Toml::string(toml))).settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}
