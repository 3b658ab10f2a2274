use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod gpu;
mod http;
mod orchestrator;
mod registry;
mod stats;
#[cfg(test)]
mod testing;

use config::Config;
use registry::{ModelRegistry, ScrfdLoader};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(
        model_dir = %config.model_dir.display(),
        gpu_enabled = config.gpu_enabled,
        workers = config.workers,
        "faceswapd starting"
    );

    let gpu = gpu::GpuInfo::probe(config.gpu_enabled).await;

    let loader = ScrfdLoader::new(config.scrfd_model_path(), config.detector_threads);
    let registry = Arc::new(ModelRegistry::new(
        Arc::new(loader),
        config.model_dir.clone(),
        config.model_load_delay,
    ));

    // Models load before the listener binds; failure leaves the service up but not ready.
    if !registry.initialize().await {
        tracing::error!("model initialization failed; /face-swap will answer 503");
    }

    let bind_addr = config.bind_addr.clone();
    let state = http::AppState::new(config, Arc::clone(&registry), gpu.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %bind_addr, device = gpu.device(), "faceswapd ready");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("faceswapd shutting down");
    registry.shutdown().await;
    tracing::info!("faceswapd shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
