//! Loader module for the stream indexer ingest.
//!
//! Accumulates index documents and writes them to the search index in one bulk request.

use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::errors::TransportError;
use stream_indexer_repository::{BatchResult, SearchIndexError, SearchIndexProvider};
use stream_indexer_shared::IndexDocument;

/// Batches documents and upserts them into one index.
///
/// Every document is written with the `index` action keyed by its id, so writing the
/// same document twice leaves exactly one copy.
pub struct BulkIndexWriter {
    provider: Arc<dyn SearchIndexProvider>,
    index: String,
    pending: Vec<IndexDocument>,
}

impl BulkIndexWriter {
    /// Create a new writer targeting `index`.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, index: impl Into<String>) -> Self {
        Self {
            provider,
            index: index.into(),
            pending: Vec::new(),
        }
    }

    /// The destination index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Append a document to the pending batch.
    pub fn add(&mut self, document: IndexDocument) {
        self.pending.push(document);
    }

    /// Number of documents waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no documents are pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Submit the pending batch as one bulk request.
    ///
    /// The pending batch is cleared whether or not the request succeeds; after a
    /// transport failure the caller redelivers the events instead.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BatchResult>)` - One result per pending document, in order
    /// * `Err(TransportError)` - If the request as a whole failed
    #[instrument(skip(self), fields(index = %self.index, count = self.pending.len()))]
    pub async fn flush(&mut self) -> Result<Vec<BatchResult>, TransportError> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let documents = std::mem::take(&mut self.pending);
        let count = documents.len();

        debug!(count = count, "Flushing documents to search index");

        let results = match self.provider.bulk_upsert(&self.index, &documents).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, count = count, "Failed to bulk index documents");
                return Err(Self::transport_error(&documents, e));
            }
        };

        if results.len() != count {
            error!(
                expected = count,
                received = results.len(),
                "Bulk response does not cover the batch"
            );
            return Err(Self::transport_error(
                &documents,
                SearchIndexError::parse(format!(
                    "expected {} bulk results, received {}",
                    count,
                    results.len()
                )),
            ));
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!(
                succeeded = count - failed,
                failed = failed,
                "Bulk index completed with some failures"
            );
            for result in &results {
                if let BatchResult::Failed(err) = result {
                    error!(
                        document_id = %err.document_id,
                        status = ?err.status,
                        error_type = ?err.error_type,
                        reason = %err.reason,
                        "Failed to index document"
                    );
                }
            }
        } else {
            debug!(count = count, "Successfully indexed all documents");
        }

        Ok(results)
    }

    fn transport_error(documents: &[IndexDocument], source: SearchIndexError) -> TransportError {
        TransportError {
            document_ids: documents.iter().map(|d| d.id().to_string()).collect(),
            source,
        }
    }
}
