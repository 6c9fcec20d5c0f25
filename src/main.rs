use anyhow::Result;
use crop_disease_node::api::{self, AppState};
use crop_disease_node::catalog::SledCatalog;
use crop_disease_node::config::Config;
use crop_disease_node::detection::Detector;
use crop_disease_node::inference::HttpInferenceClient;
use crop_disease_node::metrics;
use crop_disease_node::retry::{RetryExecutor, RetryStrategy};
use crop_disease_node::storage::CloudinaryStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting crop disease detection node...");

    metrics::init_metrics();

    let config = Config::load()?;

    // Catalog
    if let Some(parent) = config.catalog_config.db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let catalog = SledCatalog::open(&config.catalog_config.db_path)?;
    tracing::info!(
        "Disease catalog opened at {:?} ({} entries)",
        config.catalog_config.db_path,
        catalog.len()
    );

    if let Some(seed_path) = &config.catalog_config.seed_path {
        match catalog.import_file(seed_path).await {
            Ok(count) => {
                catalog.flush().await?;
                tracing::info!("Imported {} catalog entries from {:?}", count, seed_path);
            }
            Err(e) => tracing::warn!("Failed to import catalog seed {:?}: {}", seed_path, e),
        }
    }
    metrics::CATALOG_ENTRIES.set(catalog.len() as i64);

    // Outside services
    let retry = RetryExecutor::new(RetryStrategy::exponential(
        config.retry_config.max_attempts,
        config.retry_config.base_delay_ms,
    ));
    let store = CloudinaryStore::new(config.cloudinary_config.clone(), retry.clone())?;
    let inference = HttpInferenceClient::new(&config.inference_config, retry)?;
    tracing::info!(
        "Inference endpoint: {}/predict, image folder: {}",
        config.inference_config.base_url,
        config.cloudinary_config.folder
    );

    let catalog = Arc::new(catalog);
    let detector = Detector::new(
        config.detection_config.clone(),
        catalog.clone(),
        Arc::new(store),
        Arc::new(inference),
    );
    let app = api::create_router(
        AppState {
            detector,
            listing: catalog,
        },
        config.max_upload_bytes,
    );

    tracing::info!("Detection API listening on http://{}", config.bind_addr());
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
