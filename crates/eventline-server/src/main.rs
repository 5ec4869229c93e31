//! Ingest server binary for the Eventline event recorder.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (`eventline.yaml` plus environment overrides)
//! 3. Open both channel logs, recovering from torn writes
//! 4. Serve the API until `Ctrl-C`

use std::sync::Arc;

use eventline_server::{AppState, ServerConfig, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point for the ingest server.
///
/// # Errors
///
/// Returns an error if configuration, storage, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("eventline-server starting");

    // 2. Load configuration.
    let config = ServerConfig::load()?;
    info!(
        host = config.host,
        port = config.port,
        timezone = config.timezone,
        data_dir = %config.data_dir.display(),
        public_dir = %config.public_dir.display(),
        max_body_bytes = config.max_body_bytes,
        max_batch_events = config.max_batch_events,
        "Configuration loaded"
    );

    // 3. Open channel logs.
    let state = Arc::new(AppState::open(&config).await?);
    info!(
        instant = state.store.instant().len().await,
        batch = state.store.batch().len().await,
        "Channel logs ready"
    );

    // 4. Serve.
    start_server(&config, state).await?;
    info!("eventline-server stopped");

    Ok(())
}
