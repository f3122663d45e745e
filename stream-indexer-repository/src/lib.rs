//! # Stream Indexer Repository
//!
//! This crate provides the search index client interface used by the stream
//! indexer, a concrete implementation for OpenSearch, and the index lifecycle
//! manager that provisions the destination index at startup.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod lifecycle;
pub mod opensearch;
pub mod types;
pub mod utils;

pub use config::IndexSettings;
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use lifecycle::IndexLifecycleManager;
pub use opensearch::OpenSearchProvider;
pub use types::{BatchResult, IndexStatus, IndexWriteItemError};
pub use utils::{parse_endpoint, Endpoint};
