//! Result types for search index operations.

use std::fmt;

use thiserror::Error;

/// Outcome of provisioning the destination index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// The index was already present.
    AlreadyExists,
    /// The index was missing and has been created.
    Created,
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStatus::AlreadyExists => write!(f, "already exists"),
            IndexStatus::Created => write!(f, "created"),
        }
    }
}

/// A single document rejected by the search engine inside an accepted bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document {document_id} rejected ({}): {reason}", .error_type.as_deref().unwrap_or("unknown"))]
pub struct IndexWriteItemError {
    /// The id of the rejected document.
    pub document_id: String,
    /// HTTP status reported for the item, if any.
    pub status: Option<u16>,
    /// Engine error type (e.g. `mapper_parsing_exception`).
    pub error_type: Option<String>,
    /// Human readable reason.
    pub reason: String,
}

/// Result of a bulk upsert for a single document.
///
/// A bulk call returns one `BatchResult` per submitted document, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    /// The document was written (created or replaced).
    Indexed {
        /// The id of the written document.
        document_id: String,
    },
    /// The document was rejected.
    Failed(IndexWriteItemError),
}

impl BatchResult {
    /// Create a success result.
    pub fn indexed(document_id: impl Into<String>) -> Self {
        Self::Indexed {
            document_id: document_id.into(),
        }
    }

    /// Create a failure result.
    pub fn failed(
        document_id: impl Into<String>,
        status: Option<u16>,
        error_type: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Failed(IndexWriteItemError {
            document_id: document_id.into(),
            status,
            error_type,
            reason: reason.into(),
        })
    }

    /// The id of the document this result refers to.
    pub fn document_id(&self) -> &str {
        match self {
            BatchResult::Indexed { document_id } => document_id,
            BatchResult::Failed(err) => &err.document_id,
        }
    }

    /// Whether the document was written.
    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Indexed { .. })
    }
}
