//! Dependency initialization and wiring for the stream indexer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::settings::{ConnectionMode, IndexerConfig};
use crate::consumer::KafkaConsumer;
use crate::loader::BulkIndexWriter;
use crate::orchestrator::Orchestrator;
use crate::processor::DocumentTransformer;
use crate::IndexingError;
use stream_indexer_repository::{
    IndexLifecycleManager, IndexStatus, OpenSearchProvider, SearchIndexProvider,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`IndexerConfig::from_env`] for the variables read.
    ///
    /// # Arguments
    ///
    /// * `shutdown_tx` - Shutdown channel, honored while provisioning and then by the orchestrator
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies, with the destination index present
    /// * `Err(IndexingError)` - If configuration is invalid, the index cannot be provisioned,
    ///   or shutdown was requested first
    pub async fn new(shutdown_tx: broadcast::Sender<()>) -> Result<Self, IndexingError> {
        let config = IndexerConfig::from_env()?;
        Self::from_config(config, shutdown_tx).await
    }

    /// Initialize all dependencies from an explicit configuration.
    pub async fn from_config(
        config: IndexerConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<Self, IndexingError> {
        // Subscribed before any await so no signal sent during startup is missed
        let mut shutdown_rx = shutdown_tx.subscribe();

        info!(
            opensearch_url = %config.opensearch_url,
            kafka_broker = %config.kafka.brokers,
            kafka_group_id = %config.kafka.group_id,
            topics = ?config.kafka.topics,
            index = %config.index_name,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let search_provider: Arc<dyn SearchIndexProvider> = Arc::new(
            OpenSearchProvider::new(&config.opensearch_url).map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch provider: {}", e))
            })?,
        );

        // Consumption must not start before the index is confirmed present
        let lifecycle =
            IndexLifecycleManager::with_settings(search_provider.clone(), config.index_settings);
        let status = provision_index(
            &lifecycle,
            &config.index_name,
            config.connection_mode,
            config.retry_interval,
            &mut shutdown_rx,
        )
        .await?;

        info!(index = %config.index_name, status = %status, "OpenSearch index ready");

        let transformer = DocumentTransformer::with_id_pointer(config.id_pointer)
            .map_err(|e| IndexingError::config(e.to_string()))?;

        let consumer = KafkaConsumer::new(&config.kafka).map_err(|e| {
            IndexingError::config(format!("Failed to create Kafka consumer: {}", e))
        })?;

        info!("Kafka consumer created");

        let writer = BulkIndexWriter::new(search_provider, config.index_name);

        let orchestrator = Orchestrator::with_config(
            Arc::new(consumer),
            transformer,
            writer,
            config.orchestrator,
        )
        .with_shutdown(shutdown_tx, shutdown_rx);

        Ok(Self { orchestrator })
    }
}

/// Ensure the destination index exists, honoring the connection mode.
///
/// In fail-fast mode the first error is returned; in retry mode provisioning is
/// attempted again every `retry_interval` until it succeeds. A signal on `shutdown`
/// ends either mode with [`IndexingError::ShutdownRequested`].
pub async fn provision_index(
    lifecycle: &IndexLifecycleManager,
    index_name: &str,
    mode: ConnectionMode,
    retry_interval: Duration,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<IndexStatus, IndexingError> {
    loop {
        let attempt = tokio::select! {
            biased;
            _ = shutdown.recv() => return Err(IndexingError::ShutdownRequested),
            result = lifecycle.ensure_index(index_name) => result,
        };

        match attempt {
            Ok(status) => return Ok(status),
            Err(e) => match mode {
                ConnectionMode::FailFast => {
                    return Err(IndexingError::index_provisioning(format!(
                        "Failed to ensure index {} exists: {}",
                        index_name, e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        index = %index_name,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to provision index, retrying..."
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => return Err(IndexingError::ShutdownRequested),
                        _ = sleep(retry_interval) => {}
                    }
                }
            },
        }
    }
}
