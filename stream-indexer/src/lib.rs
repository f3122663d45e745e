//! # Stream Indexer
//!
//! Consumes change events from Kafka and upserts them into an OpenSearch index,
//! committing stream offsets only once the events are stored.
//!
//! ## Architecture
//!
//! The indexer follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Fetches records from Kafka and commits offsets
//! 2. **Processor**: Derives a stable document id from each event
//! 3. **Loader**: Batches documents into bulk upserts
//! 4. **Orchestrator**: Runs the fetch → transform → flush → commit loop
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`consumer`]: Stream source interface and Kafka implementation
//! - [`processor`]: Transforms event payloads into documents
//! - [`loader`]: Writes documents into the search index
//! - [`orchestrator`]: The ingestion loop and its commit cursor
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

pub use config::{Dependencies, IndexerConfig};
pub use errors::IngestError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The destination index could not be confirmed or created.
    #[error("Index provisioning error: {0}")]
    IndexProvisioningError(String),

    /// Shutdown was requested before the indexer was ready.
    #[error("Shutdown requested during initialization")]
    ShutdownRequested,

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an index provisioning error.
    pub fn index_provisioning(msg: impl Into<String>) -> Self {
        Self::IndexProvisioningError(msg.into())
    }
}
