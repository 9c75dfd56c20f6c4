//! Build the shared topic index from a PDF without running the server.
use std::path::PathBuf;

use anyhow::Context;
use exampaper_core::config::Config;
use exampaper_pipeline::ExamPipeline;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(pdf) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("Usage: exampaper-ingest <file.pdf>");
        std::process::exit(2);
    };
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;
    let pipeline = ExamPipeline::from_settings(&settings, &base)?;

    println!("Exam paper ingest\n=================");
    println!("Document: {}", pdf.display());
    println!("Index:    {}", pipeline.index_location().dir.display());

    let bytes = std::fs::read(&pdf).with_context(|| format!("reading {}", pdf.display()))?;
    let chunks = pipeline.chunk_document(&bytes).await?;
    println!("📄 {} chunks", chunks.len());

    let pb = ProgressBar::new(pipeline.label_batches(chunks.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")?
            .progress_chars("#>-"),
    );
    let report = pipeline
        .ingest(chunks, |outcome| {
            pb.set_message(outcome.label().to_string());
            pb.inc(1);
        })
        .await?;
    pb.finish_with_message("labeled");

    println!("\n✅ Indexed {} chunks ({} dims, {})", report.index.records, report.index.dim, report.index.embedder_id);
    if report.fallbacks > 0 {
        println!("⚠️  {} batch(es) fell back to the general topic", report.fallbacks);
    }
    println!("📊 Topics:");
    for (topic, count) in &report.topics {
        println!("  {count:>4}  {topic}");
    }
    Ok(())
}
