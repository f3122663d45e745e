//! Stream source interface.

use std::time::Duration;

use async_trait::async_trait;

use crate::consumer::messages::{StreamPosition, StreamRecord};
use crate::errors::IngestError;

/// A subscription to a record stream with explicit offset management.
///
/// The ingestion loop is the only caller. It fetches a batch, and either commits
/// the batch's positions once the documents are stored, or rewinds so the batch
/// is delivered again.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Subscribe to the configured topics.
    fn subscribe(&self) -> Result<(), IngestError>;

    /// Wait for the next batch of records.
    ///
    /// Suspends until at least one record is available, then keeps collecting for
    /// up to `linger` or until `max_records` are held.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(records))` - A non-empty batch
    /// * `Ok(None)` - The stream has ended
    /// * `Err(IngestError)` - If the source failed
    async fn fetch(
        &self,
        max_records: usize,
        linger: Duration,
    ) -> Result<Option<Vec<StreamRecord>>, IngestError>;

    /// Durably record that every record up to and including `positions` is processed.
    async fn commit(&self, positions: &[StreamPosition]) -> Result<(), IngestError>;

    /// Reposition the subscription so the next fetch starts at `positions`.
    async fn rewind(&self, positions: &[StreamPosition]) -> Result<(), IngestError>;
}
