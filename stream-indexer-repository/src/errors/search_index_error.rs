//! Search index error types.
//!
//! This module defines the error type returned by every search index operation.
//! Per-document failures inside a successful bulk request are not errors at this
//! level; they are reported as [`crate::types::BatchResult::Failed`].

use thiserror::Error;

/// Errors from search index operations.
///
/// Returned by the `SearchIndexProvider` trait and the `IndexLifecycleManager`.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty index name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint or failed transport setup.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request could not be delivered, or the engine rejected it as a whole.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Failed to check whether the index exists.
    #[error("Index lookup error: {0}")]
    IndexLookupError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create an index lookup error.
    pub fn index_lookup(msg: impl Into<String>) -> Self {
        Self::IndexLookupError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}
