//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;
use stream_indexer_shared::IndexDocument;

use crate::config::IndexSettings;
use crate::errors::SearchIndexError;
use crate::types::{BatchResult, IndexStatus};

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are shared, long-lived clients: they are created once at startup,
/// already authenticated, and injected into the `IndexLifecycleManager` and the
/// bulk writer. Mock implementations are used in tests.
///
/// # Note on Document Writes
///
/// There is no separate create or update call. Every write is an upsert by document
/// id: the document is created if absent and replaced if present, so applying the
/// same write twice leaves a single stored document.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check whether an index exists.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` / `Ok(false)` - Whether the index is present
    /// * `Err(SearchIndexError)` - If the engine could not be asked
    async fn index_exists(&self, name: &str) -> Result<bool, SearchIndexError>;

    /// Create an index with the given settings.
    ///
    /// # Arguments
    ///
    /// * `name` - The index name
    /// * `settings` - Settings to apply; defaults leave the engine's own defaults
    ///
    /// # Returns
    ///
    /// * `Ok(IndexStatus::Created)` - If the index was created
    /// * `Ok(IndexStatus::AlreadyExists)` - If another writer created it first
    /// * `Err(SearchIndexError)` - If creation fails
    async fn create_index(
        &self,
        name: &str,
        settings: &IndexSettings,
    ) -> Result<IndexStatus, SearchIndexError>;

    /// Upsert documents by id in a single bulk request.
    ///
    /// # Arguments
    ///
    /// * `index` - The destination index
    /// * `documents` - Documents to write
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BatchResult>)` - Exactly one result per document, in input order
    /// * `Err(SearchIndexError)` - If the request as a whole failed (nothing can be
    ///   assumed written)
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<Vec<BatchResult>, SearchIndexError>;
}
