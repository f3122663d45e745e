//! Index lifecycle management.
//!
//! The destination index must exist before the first bulk write: writing to a
//! missing index fails per document instead of failing fast, which would let the
//! consumer commit offsets for events that were never stored.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::IndexSettings;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::IndexStatus;

/// Ensures the destination index exists.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use stream_indexer_repository::{IndexLifecycleManager, OpenSearchProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = Arc::new(OpenSearchProvider::new("http://localhost:9200")?);
/// let lifecycle = IndexLifecycleManager::new(provider);
///
/// // Safe to call on every start
/// lifecycle.ensure_index("wikimedia").await?;
/// # Ok(())
/// # }
/// ```
pub struct IndexLifecycleManager {
    provider: Arc<dyn SearchIndexProvider>,
    settings: IndexSettings,
}

impl IndexLifecycleManager {
    /// Create a manager that creates missing indices with the engine defaults.
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self::with_settings(provider, IndexSettings::default())
    }

    /// Create a manager that applies `settings` when it has to create an index.
    pub fn with_settings(provider: Arc<dyn SearchIndexProvider>, settings: IndexSettings) -> Self {
        Self { provider, settings }
    }

    /// Make sure `name` exists, creating it if absent.
    ///
    /// Idempotent: a second call finds the index and does nothing.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexStatus)` - Whether the index was created or already present
    /// * `Err(SearchIndexError)` - If existence could not be confirmed or creation failed
    #[instrument(skip(self))]
    pub async fn ensure_index(&self, name: &str) -> Result<IndexStatus, SearchIndexError> {
        if name.trim().is_empty() {
            return Err(SearchIndexError::validation("Index name is required"));
        }

        if self.provider.index_exists(name).await? {
            info!(index = %name, "Index already exists");
            return Ok(IndexStatus::AlreadyExists);
        }

        let status = self.provider.create_index(name, &self.settings).await?;
        match status {
            IndexStatus::Created => info!(index = %name, "Index has been created"),
            IndexStatus::AlreadyExists => info!(index = %name, "Index already exists"),
        }
        Ok(status)
    }
}
