use std::sync::Arc;

use anyhow::Context;
use exampaper_core::config::Config;
use exampaper_pipeline::ExamPipeline;
use exampaper_server::router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let base = std::env::current_dir().context("resolving working directory")?;
    let pipeline = Arc::new(ExamPipeline::from_settings(&settings, &base)?);
    tracing::info!(
        index_dir = %pipeline.index_location().dir.display(),
        namespace = ?pipeline.index_location().namespace,
        "pipeline initialised"
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(pipeline, settings.server.max_upload_bytes))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
