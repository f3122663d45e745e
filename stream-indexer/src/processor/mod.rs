//! Processor module for the stream indexer ingest.
//!
//! Transforms raw change events into index documents.

mod document_transformer;

pub use document_transformer::{DocumentTransformer, DEFAULT_ID_POINTER};
