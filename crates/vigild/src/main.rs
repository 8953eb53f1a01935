use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigil_core::{FramePipeline, VisionModel};
use vigil_store::FaceStore;
use vigil_vision::HttpVision;

mod config;
mod enrich;
mod gallery;
mod server;

use config::Config;
use enrich::Enricher;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("vigild starting");

    let config = Config::from_env();
    let pipeline_config = config.pipeline_config().context("invalid configuration")?;

    let store = FaceStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;

    let vision: Arc<dyn VisionModel> =
        Arc::new(HttpVision::new(&config.vision_url, config.vision_timeout()));
    tracing::info!(url = %config.vision_url, "using vision sidecar");

    let gallery = gallery::build(
        &store,
        config.known_faces_dir.clone(),
        Arc::clone(&vision),
        pipeline_config.detection_method.clone(),
    )
    .await?;
    tracing::info!(
        entries = gallery.len(),
        identities = gallery.identity_count(),
        "gallery loaded"
    );
    if gallery.is_empty() {
        tracing::warn!("gallery is empty, every face will be reported as Unknown");
    }

    let pipeline = FramePipeline::new(pipeline_config, Arc::new(gallery), vision)
        .context("invalid configuration")?;

    let enricher = if config.enrichment_timeout_ms == 0 {
        Enricher::disabled()
    } else {
        Enricher::new(store, config.enrichment_timeout())
    };

    let state = AppState {
        pipeline: Arc::new(pipeline),
        enricher,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "vigild ready");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("vigild shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
