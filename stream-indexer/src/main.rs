//! Stream Indexer Main Entry Point
//!
//! Consumes change events from Kafka and upserts them into an OpenSearch index.

use dotenv::dotenv;
use std::env;
use stream_indexer::{Dependencies, IndexingError};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), IndexingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("stream_indexer=info,stream_indexer_repository=info")
    });

    let json_logs = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        // Structured output for log shippers
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "stream-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "stream-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting stream indexer");

    // Ctrl-C is honored from here on, including while the index is being provisioned
    let (shutdown_tx, _) = broadcast::channel(1);
    let shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            let _ = shutdown.send(());
        }
    });

    let mut deps = match Dependencies::new(shutdown_tx).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(IndexingError::ShutdownRequested) => {
            info!("Shutdown requested before the indexer was ready");
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.orchestrator.run().await {
        Ok(()) => {
            info!("Stream indexer stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Stream indexer failed");
            Err(e.into())
        }
    }
}
