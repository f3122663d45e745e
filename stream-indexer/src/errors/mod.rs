//! Error types for the stream indexer ingest.
//!
//! | Error | Scope | Effect on the loop |
//! |---|---|---|
//! | [`MalformedEventError`] | one record | record skipped and logged |
//! | `IndexWriteItemError` | one document | logged, offsets still committed |
//! | [`TransportError`] | whole batch | offsets not committed, batch redelivered |
//! | `IndexingError::IndexProvisioningError` | startup | process exits before consuming |

use stream_indexer_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur in the stream indexer ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// The stream source could not be repositioned for redelivery.
    #[error("Rewind error: {0}")]
    RewindError(String),

    /// Invalid component configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestError {
    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a rewind error.
    pub fn rewind(msg: impl Into<String>) -> Self {
        Self::RewindError(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for IngestError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

/// A record whose payload cannot become an index document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedEventError {
    /// The record carried no payload (e.g. a tombstone).
    #[error("record has no payload")]
    MissingPayload,

    /// The payload is not UTF-8 text.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// The payload is not JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    /// The identity field is absent.
    #[error("identity field {pointer} is missing")]
    MissingId { pointer: String },

    /// The identity field is present but not a string.
    #[error("identity field {pointer} is not a string")]
    IdNotString { pointer: String },

    /// The identity field is an empty string.
    #[error("identity field {pointer} is empty")]
    EmptyId { pointer: String },
}

/// A bulk write failed as a whole; none of its documents can be assumed stored.
#[derive(Error, Debug, Clone)]
#[error("bulk write of {} documents failed: {source}", .document_ids.len())]
pub struct TransportError {
    /// Ids of every document that was in the failed batch, in submission order.
    pub document_ids: Vec<String>,
    /// The underlying search index error.
    pub source: SearchIndexError,
}
